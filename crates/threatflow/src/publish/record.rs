//! STIX output records.

use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::kind::RecordKind;

/// Suffix shared by the Attack Flow extension and its author.
const EXTENSION_ID: &str = "fb9c968a-745b-4ade-9b25-c324172197f4";
const EXTENSION_SCHEMA: &str =
    "https://center-for-threat-informed-defense.github.io/attack-flow/stix/attack-flow-schema-2.0.0.json";
const EXTENSION_VERSION: &str = "2.0.0";
const EXTENSION_DATE: &str = "2022-08-02T19:34:35.143Z";
const EXTENSION_AUTHOR: &str = "MITRE Center for Threat-Informed Defense";

pub const SPEC_VERSION: &str = "2.1";

/// One object of the published bundle.
///
/// Fields keep insertion order, so the common header (`type`, `id`,
/// `spec_version`, `created`, `modified`) always serializes first.
#[derive(Debug, Clone, PartialEq)]
pub struct StixRecord {
    kind: RecordKind,
    fields: Map<String, Value>,
}

impl StixRecord {
    /// Creates a record with id `<type_name>--<suffix>`.
    pub fn new(type_name: &str, suffix: &str, timestamp: &str) -> Self {
        let kind = RecordKind::from_type_name(type_name);
        let mut fields = Map::new();
        fields.insert("type".into(), Value::from(type_name));
        fields.insert("id".into(), Value::from(format!("{type_name}--{suffix}")));
        fields.insert("spec_version".into(), Value::from(SPEC_VERSION));
        fields.insert("created".into(), Value::from(timestamp));
        fields.insert("modified".into(), Value::from(timestamp));
        if kind.is_extension_type() {
            fields.insert(
                "extensions".into(),
                json!({
                    format!("extension-definition--{EXTENSION_ID}"): {
                        "extension_type": "new-sdo"
                    }
                }),
            );
        }
        Self { kind, fields }
    }

    /// Creates a record with a random id suffix.
    pub fn generate(type_name: &str, timestamp: &str) -> Self {
        Self::new(type_name, &Uuid::new_v4().to_string(), timestamp)
    }

    /// The Attack Flow extension declaration.
    pub fn extension_definition() -> Self {
        let author = Self::extension_author();
        let mut record = Self::new("extension-definition", EXTENSION_ID, EXTENSION_DATE);
        record.set("name", "Attack Flow");
        record.set(
            "description",
            "Extends STIX 2.1 with features to create Attack Flows.",
        );
        record.set("created_by_ref", author.id());
        record.set("schema", EXTENSION_SCHEMA);
        record.set("version", EXTENSION_VERSION);
        record.set("extension_types", json!(["new-sdo"]));
        record.set(
            "external_references",
            json!([
                {
                    "source_name": "Documentation",
                    "description": "Documentation for Attack Flow",
                    "url": "https://center-for-threat-informed-defense.github.io/attack-flow"
                },
                {
                    "source_name": "GitHub",
                    "description": "Source code repository for Attack Flow",
                    "url": "https://github.com/center-for-threat-informed-defense/attack-flow"
                }
            ]),
        );
        record
    }

    /// The identity that authored the extension. It is its own creator.
    pub fn extension_author() -> Self {
        let mut record = Self::new("identity", EXTENSION_ID, EXTENSION_DATE);
        let id = record.id().to_string();
        record.set("created_by_ref", id);
        record.set("name", EXTENSION_AUTHOR);
        record.set("identity_class", "organization");
        record
    }

    /// A standalone `parent -> child` relationship.
    pub fn relationship(
        relationship_type: &str,
        source_ref: &str,
        target_ref: &str,
        timestamp: &str,
    ) -> Self {
        let mut record = Self::generate("relationship", timestamp);
        record.set("relationship_type", relationship_type);
        record.set("source_ref", source_ref);
        record.set("target_ref", target_ref);
        record
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        self.fields.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Sets a field, replacing any previous value in place.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.fields
    }

    /// Appends `id` to the reference list `key`, creating it if needed.
    pub fn push_ref(&mut self, key: &str, id: &str) {
        let entry = self
            .fields
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(Value::from(id)),
            other => *other = json!([id]),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: &str = "2024-01-01T00:00:00.000Z";

    #[test]
    fn test_header_fields() {
        let record = StixRecord::new("process", "abc", NOW);
        assert_eq!(record.id(), "process--abc");
        assert_eq!(record.kind(), RecordKind::Process);
        let keys: Vec<_> = record.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, ["type", "id", "spec_version", "created", "modified"]);
    }

    #[test]
    fn test_attack_types_declare_extension() {
        let record = StixRecord::new("attack-action", "abc", NOW);
        let extensions = record.get("extensions").unwrap();
        assert_eq!(
            extensions["extension-definition--fb9c968a-745b-4ade-9b25-c324172197f4"]["extension_type"],
            "new-sdo"
        );
        assert!(!StixRecord::new("identity", "abc", NOW).has("extensions"));
    }

    #[test]
    fn test_extension_records() {
        let definition = StixRecord::extension_definition();
        let author = StixRecord::extension_author();
        assert_eq!(
            definition.id(),
            "extension-definition--fb9c968a-745b-4ade-9b25-c324172197f4"
        );
        assert_eq!(author.id(), "identity--fb9c968a-745b-4ade-9b25-c324172197f4");
        assert_eq!(definition.get("created_by_ref").unwrap(), author.id());
        assert_eq!(author.get("created_by_ref").unwrap(), author.id());
        assert_eq!(definition.get("created").unwrap(), EXTENSION_DATE);
    }

    #[test]
    fn test_push_ref() {
        let mut record = StixRecord::new("note", "abc", NOW);
        record.push_ref("object_refs", "process--1");
        record.push_ref("object_refs", "process--2");
        assert_eq!(
            record.get("object_refs").unwrap(),
            &json!(["process--1", "process--2"])
        );
    }

    #[test]
    fn test_relationship() {
        let record = StixRecord::relationship("related-to", "a--1", "b--2", NOW);
        assert!(record.id().starts_with("relationship--"));
        assert_eq!(record.get("source_ref").unwrap(), "a--1");
        assert_eq!(record.get("target_ref").unwrap(), "b--2");
    }
}
