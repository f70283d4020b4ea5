//! STIX 2.1 bundle publishing.
//!
//! Publishing runs in two passes over a [`SemanticGraph`]. The first converts
//! every node into a record on its own. The second walks each node's outgoing
//! edges and either embeds the child's id in a reference field of the parent
//! (or, for network traffic, of the child) or emits a standalone relationship.
//! Embedding needs both records to exist, hence the separate pass.
//!
//! Bundle object order: the extension declaration, its author, the flow, the
//! flow's author, one record per node in graph order, then relationships in
//! discovery order.

mod convert;
mod kind;
mod record;
mod start_refs;

pub use kind::{Embed, RecordKind, embed_rule};
pub use record::StixRecord;
pub use start_refs::compute_start_refs;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{debug, info, trace};
use serde_json::{Value, json};
use uuid::Uuid;

use threatflow_core::{diagram::ObjectKind, identifier::InstanceId, template::TemplateCatalog};

use crate::{
    config::PublishConfig,
    error::PublishError,
    semantic::{SemanticGraph, SemanticNode},
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// A published bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct StixBundle {
    id: String,
    timestamp: String,
    objects: Vec<StixRecord>,
}

impl StixBundle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn objects(&self) -> &[StixRecord] {
        &self.objects
    }

    /// Finds a record by its STIX id.
    pub fn object(&self, id: &str) -> Option<&StixRecord> {
        self.objects.iter().find(|record| record.id() == id)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "type": "bundle",
            "id": self.id,
            "spec_version": record::SPEC_VERSION,
            "created": self.timestamp,
            "modified": self.timestamp,
            "objects": self
                .objects
                .iter()
                .map(|record| record.clone().into_value())
                .collect::<Vec<_>>(),
        })
    }

    /// Serializes the bundle.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Serialize`] if serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String, PublishError> {
        let value = self.to_value();
        let text = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }
}

/// Converts semantic graphs into STIX bundles.
#[derive(Debug, Clone, Copy)]
pub struct Publisher<'a> {
    catalog: &'a TemplateCatalog,
    config: &'a PublishConfig,
    clock: Option<DateTime<Utc>>,
}

impl<'a> Publisher<'a> {
    pub fn new(catalog: &'a TemplateCatalog, config: &'a PublishConfig) -> Self {
        Self {
            catalog,
            config,
            clock: None,
        }
    }

    /// Stamps every generated record with `now` instead of the current time.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    /// Publishes the graph as a bundle.
    ///
    /// # Errors
    ///
    /// - [`PublishError::MissingCanvas`] if the graph root is not a canvas
    ///   template of the catalog.
    /// - [`PublishError::MissingField`] or [`PublishError::ShapeMismatch`] if a
    ///   property does not have the layout publishing expects.
    /// - [`PublishError::NoStartRefs`] if the actions form a cycle.
    pub fn publish(&self, graph: &SemanticGraph<'_>) -> Result<StixBundle, PublishError> {
        let timestamp = self
            .clock
            .unwrap_or_else(Utc::now)
            .format(TIMESTAMP_FORMAT)
            .to_string();

        let canvas = graph.root();
        let is_canvas = self
            .catalog
            .get(canvas.template())
            .is_ok_and(|template| template.kind == ObjectKind::Canvas);
        if !is_canvas {
            return Err(PublishError::MissingCanvas);
        }

        let mut records = Vec::with_capacity(graph.nodes_count());
        let mut index: HashMap<InstanceId, usize> = HashMap::with_capacity(graph.nodes_count());
        for node in graph.members() {
            let record = self.node_record(node, &timestamp)?;
            trace!(id = record.id(); "Node converted");
            index.insert(node.instance(), records.len());
            records.push(record);
        }

        let nodes: Vec<InstanceId> = graph.members().map(|node| node.instance()).collect();
        let start_refs = compute_start_refs(
            &nodes,
            |id| index.get(&id).is_some_and(|&i| records[i].kind().is_actionable()),
            |id| graph.next_nodes(id).collect::<Vec<_>>(),
        )?;
        let start_refs: Vec<&str> = start_refs
            .iter()
            .filter_map(|id| index.get(id).map(|&i| records[i].id()))
            .collect();

        let canvas_props = canvas.properties().value();
        let author = convert::author_record(canvas_props, &timestamp)?;
        let mut flow = StixRecord::new(
            &self.catalog.stix_type(canvas.template()),
            &canvas.instance().to_string(),
            &timestamp,
        );
        flow.set("created_by_ref", author.id());
        flow.set("start_refs", start_refs);
        convert::merge_flow(&mut flow, canvas_props)?;

        let mut relationships = Vec::new();
        for parent in &nodes {
            for edge in graph.next(*parent) {
                let Some((source, target)) = edge.ends() else {
                    continue;
                };
                let (Some(&p), Some(&c)) = (index.get(&source.node), index.get(&target.node)) else {
                    continue;
                };
                if let Some(relationship) = self.embed(&mut records, p, c, source.via, &timestamp) {
                    relationships.push(relationship);
                }
            }
        }
        debug!(
            records = records.len(),
            relationships = relationships.len();
            "Edges resolved"
        );

        let mut objects = Vec::with_capacity(records.len() + relationships.len() + 4);
        objects.push(StixRecord::extension_definition());
        objects.push(StixRecord::extension_author());
        objects.push(flow);
        objects.push(author);
        objects.extend(records);
        objects.extend(relationships);

        let bundle = StixBundle {
            id: format!("bundle--{}", Uuid::new_v4()),
            timestamp,
            objects,
        };
        info!(bundle = bundle.id(), objects = bundle.objects.len(); "Bundle published");
        Ok(bundle)
    }

    fn node_record(&self, node: SemanticNode<'_>, timestamp: &str) -> Result<StixRecord, PublishError> {
        let type_name = self.catalog.stix_type(node.template());
        let mut record = StixRecord::new(&type_name, &node.instance().to_string(), timestamp);
        let props = node.properties().value();
        match record.kind() {
            RecordKind::AttackAction => convert::merge_action(&mut record, props, self.catalog)?,
            kind => {
                let lowercase = kind == RecordKind::MacAddr;
                convert::merge_basic(record.fields_mut(), props.iter(), lowercase)?;
            }
        }
        Ok(record)
    }

    /// Connects `records[child]` to `records[parent]`. Returns the
    /// relationship to emit when no embedding applies.
    fn embed(
        &self,
        records: &mut [StixRecord],
        parent: usize,
        child: usize,
        via: Option<&str>,
        timestamp: &str,
    ) -> Option<StixRecord> {
        let parent_id = records[parent].id().to_string();
        let child_id = records[child].id().to_string();

        for rule in embed_rule(records[parent].kind(), records[child].kind(), via) {
            match *rule {
                Embed::ParentSlot(key) if !records[parent].has(key) => {
                    records[parent].set(key, child_id.as_str());
                }
                Embed::ParentList(key) => records[parent].push_ref(key, &child_id),
                Embed::ChildSlot(key) if !records[child].has(key) => {
                    records[child].set(key, parent_id.as_str());
                }
                _ => continue,
            }
            trace!(parent = parent_id.as_str(), rule:? = rule; "Embedded reference");
            return None;
        }

        debug!(source = parent_id.as_str(), target = child_id.as_str(); "Emitting relationship");
        Some(StixRecord::relationship(
            self.config.relationship_type(),
            &parent_id,
            &child_id,
            timestamp,
        ))
    }
}
