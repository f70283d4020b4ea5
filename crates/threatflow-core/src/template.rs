//! Object templates and the template catalog.
//!
//! A [`TemplateCatalog`] lists every object kind a diagram may contain: its
//! structural kind, its property layout, the anchors a block carries, the
//! latches and handles a line is built with, and the external type name used
//! when publishing. The built-in Attack Flow catalog ships as JSON inside the
//! crate; [`TemplateCatalog::from_json`] loads replacements.

use chrono_tz::Tz;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    diagram::ObjectKind,
    error::ModelError,
    identifier::TemplateId,
    property::{DictionaryProperty, PropertyDescriptor, PropertyMeta, RootProperty},
};

const ATTACK_FLOW_CATALOG: &str = include_str!("../catalog/attack_flow.json");

/// How a template participates in the semantic graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateRole {
    /// A meaningful node (blocks and canvases).
    Node,
    /// A connection between nodes (lines).
    Edge,
    /// Purely structural (anchors, latches, handles).
    None,
}

/// Layout of one object kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTemplate {
    pub kind: ObjectKind,
    #[serde(default)]
    pub properties: IndexMap<String, PropertyDescriptor>,
    /// Block anchors: position to anchor template id.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub anchors: IndexMap<String, TemplateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_latch: Option<TemplateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_latch: Option<TemplateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<TemplateId>,
    /// External type name; derived from the template id when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stix_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<TemplateRole>,
}

impl ObjectTemplate {
    /// The explicit role, or the one implied by the kind.
    pub fn role(&self) -> TemplateRole {
        self.role.unwrap_or(match self.kind {
            ObjectKind::Canvas | ObjectKind::Group | ObjectKind::Block => TemplateRole::Node,
            ObjectKind::Line => TemplateRole::Edge,
            ObjectKind::Anchor | ObjectKind::Latch | ObjectKind::Handle => TemplateRole::None,
        })
    }

    /// Builds the property tree described by this template, defaults applied
    /// and dates set in `zone`.
    pub fn build_properties(&self, zone: Tz) -> Result<RootProperty, ModelError> {
        let mut root = DictionaryProperty::new(PropertyMeta::new("root"));
        for (id, descriptor) in &self.properties {
            root.add_field(descriptor.build_in(id, zone)?)?;
            if descriptor.is_representative {
                root.set_representative(id);
            }
        }
        Ok(RootProperty::new(root))
    }
}

/// Every template known to a diagram, plus external id lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateCatalog {
    #[serde(default)]
    pub name: String,
    pub templates: IndexMap<TemplateId, ObjectTemplate>,
    /// Tactic and technique ids to external object ids.
    #[serde(default)]
    pub stix_ids: IndexMap<String, String>,
}

impl TemplateCatalog {
    /// Parses a catalog from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] if the text is not a valid catalog.
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let catalog: TemplateCatalog = serde_json::from_str(text)?;
        debug!(
            catalog = catalog.name.as_str(),
            templates = catalog.templates.len(),
            stix_ids = catalog.stix_ids.len();
            "Template catalog loaded"
        );
        Ok(catalog)
    }

    /// The built-in Attack Flow catalog.
    pub fn attack_flow() -> Result<Self, ModelError> {
        Self::from_json(ATTACK_FLOW_CATALOG)
    }

    /// Looks up a template.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTemplate`] if no template has that id.
    pub fn get(&self, id: TemplateId) -> Result<&ObjectTemplate, ModelError> {
        self.templates
            .get(&id)
            .ok_or_else(|| ModelError::UnknownTemplate(id.as_string()))
    }

    pub fn contains(&self, id: TemplateId) -> bool {
        self.templates.contains_key(&id)
    }

    /// The external type name of a template.
    ///
    /// Falls back to the id with underscores turned into dashes.
    pub fn stix_type(&self, id: TemplateId) -> String {
        self.templates
            .get(&id)
            .and_then(|t| t.stix_type.clone())
            .unwrap_or_else(|| id.as_string().replace('_', "-"))
    }

    /// Resolves a tactic or technique id to its external object id.
    pub fn stix_id(&self, key: &str) -> Option<&str> {
        self.stix_ids.get(key).map(String::as_str)
    }

    /// The first canvas template, used for new diagrams.
    pub fn canvas_template(&self) -> Option<TemplateId> {
        self.templates
            .iter()
            .find(|(_, t)| t.kind == ObjectKind::Canvas)
            .map(|(id, _)| *id)
    }

    /// The first line template, used for new connections.
    pub fn line_template(&self) -> Option<TemplateId> {
        self.templates
            .iter()
            .find(|(_, t)| t.kind == ObjectKind::Line)
            .map(|(id, _)| *id)
    }
}
