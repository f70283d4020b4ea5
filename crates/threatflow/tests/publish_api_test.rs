//! Integration tests for the FlowPublisher API
//!
//! These tests load the demo diagrams and check the published bundles.

use std::{fs, path::PathBuf};

use chrono::{TimeZone, Utc};
use serde_json::{Value, json};

use threatflow::{
    FlowError, FlowPublisher, PublishError,
    config::{AppConfig, CatalogConfig, PublishConfig},
    diagram::Endpoint,
    identifier::TemplateId,
};

fn demo(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../demos")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|err| panic!("Failed to read {path:?}: {err}"))
}

fn publisher() -> FlowPublisher {
    FlowPublisher::new(AppConfig::default())
        .expect("Failed to create publisher")
        .with_clock(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
}

fn publish_demo(name: &str) -> Value {
    let publisher = publisher();
    let document = publisher.load(&demo(name)).expect("Failed to load demo");
    let text = publisher.publish(&document).expect("Failed to publish demo");
    serde_json::from_str(&text).expect("Bundle is not valid JSON")
}

fn objects_of<'a>(bundle: &'a Value, type_name: &str) -> Vec<&'a Value> {
    bundle["objects"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|object| object["type"] == type_name)
        .collect()
}

fn named<'a>(bundle: &'a Value, type_name: &str, name: &str) -> &'a Value {
    objects_of(bundle, type_name)
        .into_iter()
        .find(|object| object["name"] == name)
        .unwrap_or_else(|| panic!("No {type_name} named {name}"))
}

#[test]
fn test_publisher_api_exists() {
    let _publisher = FlowPublisher::new(AppConfig::default()).unwrap();
}

#[test]
fn test_phishing_bundle_header() {
    let bundle = publish_demo("phishing_intrusion.json");

    assert_eq!(bundle["type"], "bundle");
    assert_eq!(bundle["spec_version"], "2.1");
    assert_eq!(bundle["created"], "2024-06-01T12:00:00.000Z");

    let objects = bundle["objects"].as_array().unwrap();
    assert_eq!(
        objects[0]["id"],
        "extension-definition--fb9c968a-745b-4ade-9b25-c324172197f4"
    );
    assert_eq!(objects[1]["id"], "identity--fb9c968a-745b-4ade-9b25-c324172197f4");
    assert_eq!(objects[2]["type"], "attack-flow");
    assert_eq!(objects[3]["type"], "identity");

    let flow = &objects[2];
    assert_eq!(flow["name"], "Phishing Intrusion");
    assert_eq!(flow["scope"], "incident");
    assert_eq!(flow["created"], "2024-03-01T08:30:00.000Z");
    assert_eq!(flow["created_by_ref"], objects[3]["id"]);
    assert_eq!(
        flow["external_references"],
        json!([{"source_name": "Incident report", "url": "https://example.com/reports/ir-042"}])
    );

    let author = &objects[3];
    assert_eq!(author["name"], "Threat Intel Team");
    assert_eq!(author["identity_class"], "organization");
}

#[test]
fn test_phishing_embeds_everything() {
    let bundle = publish_demo("phishing_intrusion.json");

    let spear = named(&bundle, "attack-action", "Spearphishing Attachment");
    let execute = named(&bundle, "attack-action", "User Execution");
    let persist = named(&bundle, "attack-action", "Scheduled Task");
    let fallback = named(&bundle, "attack-action", "Valid Accounts");
    let condition = objects_of(&bundle, "attack-condition")[0];
    let asset = named(&bundle, "attack-asset", "Finance workstation");
    let process = objects_of(&bundle, "process")[0];

    assert_eq!(bundle["objects"][2]["start_refs"], json!([spear["id"]]));

    assert_eq!(spear["tactic_id"], "TA0001");
    assert_eq!(spear["technique_id"], "T1566");
    assert!(spear["technique_ref"].as_str().unwrap().starts_with("attack-pattern--"));
    assert_eq!(spear["confidence"], 90);

    assert_eq!(spear["effect_refs"], json!([execute["id"]]));
    assert_eq!(execute["effect_refs"], json!([condition["id"]]));
    assert_eq!(execute["asset_refs"], json!([asset["id"]]));
    assert_eq!(condition["on_true_refs"], json!([persist["id"]]));
    assert_eq!(condition["on_false_refs"], json!([fallback["id"]]));
    assert_eq!(asset["object_ref"], process["id"]);

    assert_eq!(process["pid"], 4242);
    assert_eq!(process["is_hidden"], false);

    assert!(objects_of(&bundle, "relationship").is_empty());
}

#[test]
fn test_edge_exploitation_relationships() {
    let bundle = publish_demo("edge_exploitation.json");

    let exploit = named(&bundle, "attack-action", "Exploit VPN appliance");
    let escalate = named(&bundle, "attack-action", "Kernel exploit");
    let operator = objects_of(&bundle, "attack-operator")[0];
    let address = objects_of(&bundle, "ipv4-addr")[0];
    let traffic = objects_of(&bundle, "network-traffic")[0];
    let domain = objects_of(&bundle, "domain-name")[0];
    let mac = objects_of(&bundle, "mac-addr")[0];
    let malware = named(&bundle, "malware", "EdgeShell");
    let file = objects_of(&bundle, "file")[0];

    assert_eq!(bundle["objects"][2]["start_refs"], json!([exploit["id"]]));
    assert_eq!(exploit["effect_refs"], json!([operator["id"]]));
    assert_eq!(operator["effect_refs"], json!([escalate["id"]]));
    assert_eq!(operator["operator"], "OR");

    assert_eq!(traffic["src_ref"], address["id"]);
    assert_eq!(traffic["dst_ref"], domain["id"]);
    assert_eq!(traffic["protocols"], json!(["tcp", "tls"]));

    assert_eq!(mac["value"], "00:1a:2b:3c:4d:5e");
    assert_eq!(malware["is_family"], true);
    assert_eq!(malware["aliases"], json!(["ES-Backdoor"]));
    assert_eq!(
        file["hashes"],
        json!({"SHA-256": "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"})
    );

    let pairs: Vec<(&Value, &Value)> = objects_of(&bundle, "relationship")
        .into_iter()
        .map(|r| (&r["source_ref"], &r["target_ref"]))
        .collect();
    assert_eq!(pairs.len(), 4);
    assert!(pairs.contains(&(&exploit["id"], &address["id"])));
    assert!(pairs.contains(&(&escalate["id"], &malware["id"])));
    assert!(pairs.contains(&(&malware["id"], &file["id"])));
    assert!(pairs.contains(&(&address["id"], &mac["id"])));
}

#[test]
fn test_relationship_type_from_config() {
    let config = AppConfig::new(
        PublishConfig::new(false, "uses", "UTC"),
        CatalogConfig::default(),
    );
    let publisher = FlowPublisher::new(config).unwrap();
    let document = publisher.load(&demo("edge_exploitation.json")).unwrap();
    let text = publisher.publish(&document).unwrap();

    assert!(!text.contains('\n'), "Compact output expected");
    let bundle: Value = serde_json::from_str(&text).unwrap();
    for relationship in objects_of(&bundle, "relationship") {
        assert_eq!(relationship["relationship_type"], "uses");
    }
}

#[test]
fn test_document_round_trip() {
    let publisher = publisher();
    let document = publisher.load(&demo("phishing_intrusion.json")).unwrap();
    let text = document.to_json(false).unwrap();
    let copy = publisher.load(&text).unwrap();

    assert_eq!(copy.diagram().len(), document.diagram().len());
    let original = publisher.publish_bundle(&document).unwrap();
    let reloaded = publisher.publish_bundle(&copy).unwrap();
    assert_eq!(original.objects().len(), reloaded.objects().len());
}

#[test]
fn test_action_cycle_is_rejected() {
    let publisher = publisher();
    let mut document = publisher.create().unwrap();
    let factory = publisher.factory().unwrap();
    let canvas = document.canvas();
    let line_template = publisher.catalog().line_template().unwrap();
    let diagram = document.diagram_mut();

    let first = factory.create(diagram, TemplateId::new("action")).unwrap();
    let second = factory.create(diagram, TemplateId::new("action")).unwrap();
    diagram.add_child(canvas, first, None).unwrap();
    diagram.add_child(canvas, second, None).unwrap();
    for (from, to) in [(first, second), (second, first)] {
        let line = factory.create(diagram, line_template).unwrap();
        diagram.add_child(canvas, line, None).unwrap();
        let source = diagram.endpoint(line, Endpoint::Source).unwrap();
        let target = diagram.endpoint(line, Endpoint::Target).unwrap();
        let out = diagram.get(from).unwrap().as_block().unwrap().anchor("d270").unwrap();
        let into = diagram.get(to).unwrap().as_block().unwrap().anchor("d90").unwrap();
        diagram.link(out, source).unwrap();
        diagram.link(into, target).unwrap();
    }

    let result = publisher.publish(&document);
    assert!(
        matches!(result, Err(FlowError::Publish(PublishError::NoStartRefs))),
        "Expected a start-ref error, got {result:?}"
    );
}

#[test]
fn test_malformed_json_keeps_source() {
    let source = "{\"schema\": \"threatflow/1\", \"objects\": [";
    let result = publisher().load(source);
    match result {
        Err(FlowError::Json { src, .. }) => assert_eq!(src, source),
        other => panic!("Expected a JSON error, got {other:?}"),
    }
}

#[test]
fn test_new_flow_needs_no_author_fields() {
    let publisher = publisher();
    let document = publisher.create().unwrap();
    let bundle = publisher.publish_bundle(&document).unwrap();
    let flow = &bundle.objects()[2];
    assert_eq!(flow.get("name").unwrap(), "Untitled Document");
    assert_eq!(flow.get("start_refs").unwrap(), &json!([]));
}
