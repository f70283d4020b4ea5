//! Diagram file format.
//!
//! A diagram file is a flat list of object exports, parents before children:
//!
//! ```json
//! {
//!   "schema": "threatflow/1",
//!   "objects": [
//!     { "id": "flow", "instance": "…", "properties": { "name": "Demo" }, "objects": ["…"] },
//!     { "id": "action", "instance": "…", "anchors": { "d0": "…" } },
//!     { "id": "horizontal_anchor", "instance": "…", "latches": ["…"] }
//!   ]
//! }
//! ```
//!
//! Children and links are referenced by instance id. Import re-creates every
//! object through a [`DiagramFactory`], so anchors and latches the file leaves
//! out are filled in from their templates.

use indexmap::{IndexMap, IndexSet};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    diagram::{Attributes, Diagram, Endpoint, ObjectBody, ObjectKey, ObjectKind},
    error::ModelError,
    factory::DiagramFactory,
    identifier::{InstanceId, TemplateId},
};

/// Schema tag written to every file.
pub const SCHEMA: &str = "threatflow/1";

/// One object in a diagram file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectExport {
    /// Template id.
    pub id: TemplateId,
    pub instance: InstanceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<u32>,
    /// Blocks and lines of a canvas or group.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<InstanceId>>,
    /// Anchors of a block, by position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchors: Option<IndexMap<String, InstanceId>>,
    /// Latches linked to an anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latches: Option<Vec<InstanceId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handles: Option<Vec<InstanceId>>,
}

impl ObjectExport {
    fn bare(id: TemplateId, instance: InstanceId) -> Self {
        Self {
            id,
            instance,
            properties: None,
            attributes: None,
            objects: None,
            anchors: None,
            latches: None,
            source: None,
            target: None,
            handles: None,
        }
    }
}

/// A serialized diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramFile {
    pub schema: String,
    pub objects: Vec<ObjectExport>,
}

impl DiagramFile {
    /// Parses a diagram file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Json`] for malformed JSON and
    /// [`ModelError::UnsupportedSchema`] for files written in another format.
    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let file: DiagramFile = serde_json::from_str(text)?;
        if file.schema != SCHEMA {
            return Err(ModelError::UnsupportedSchema(file.schema));
        }
        Ok(file)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String, ModelError> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }

    /// Serializes `root` and everything it owns.
    ///
    /// Links leaving the exported subtree are dropped.
    pub fn export(diagram: &Diagram, root: ObjectKey) -> Result<Self, ModelError> {
        let order = diagram.subtree(root);
        if order.is_empty() {
            return Err(ModelError::NotFound(format!("{root:?}")));
        }
        let exported: IndexSet<ObjectKey> = order.iter().copied().collect();
        let instance = |key: ObjectKey| diagram.object(key).map(|o| o.instance());

        let mut objects = Vec::with_capacity(order.len());
        for key in order {
            let object = diagram.object(key)?;
            let mut export = ObjectExport::bare(object.template(), object.instance());
            let properties = object.properties().to_json();
            if properties.as_object().is_some_and(|map| !map.is_empty()) {
                export.properties = Some(properties);
            }
            if !object.attributes().is_empty() {
                export.attributes = Some(object.attributes().bits());
            }
            match object.body() {
                ObjectBody::Canvas(group) | ObjectBody::Group(group) => {
                    let children = group.blocks().iter().chain(group.lines());
                    export.objects = Some(children.map(|k| instance(*k)).collect::<Result<_, _>>()?);
                }
                ObjectBody::Block(block) => {
                    let mut anchors = IndexMap::new();
                    for (position, anchor) in block.anchors() {
                        anchors.insert(position.to_string(), instance(anchor)?);
                    }
                    export.anchors = Some(anchors);
                }
                ObjectBody::Anchor { latches } => {
                    export.latches = Some(
                        latches
                            .iter()
                            .filter(|latch| exported.contains(*latch))
                            .map(|latch| instance(*latch))
                            .collect::<Result<_, _>>()?,
                    );
                }
                ObjectBody::Line(line) => {
                    export.source = line.source().map(instance).transpose()?;
                    export.target = line.target().map(instance).transpose()?;
                    export.handles =
                        Some(line.handles().iter().map(|k| instance(*k)).collect::<Result<_, _>>()?);
                }
                ObjectBody::Latch { .. } | ObjectBody::Handle => {}
            }
            objects.push(export);
        }
        debug!(objects = objects.len(); "Diagram exported");
        Ok(Self {
            schema: SCHEMA.to_string(),
            objects,
        })
    }

    /// Rebuilds the diagram in a fresh arena and returns it with its canvas.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnknownTemplate`] for template ids the catalog lacks.
    /// - [`ModelError::MissingObject`] for references to undeclared objects.
    /// - [`ModelError::NoRoot`] / [`ModelError::MultipleRoots`] unless exactly
    ///   one object is left without a parent, and [`ModelError::WrongKind`] if
    ///   that object is not a canvas.
    /// - Any structural error raised while re-assembling the tree.
    pub fn import(&self, factory: &DiagramFactory<'_>) -> Result<(Diagram, ObjectKey), ModelError> {
        let mut diagram = Diagram::new();

        // Objects
        let mut keys = IndexMap::with_capacity(self.objects.len());
        for export in &self.objects {
            let key = factory.spawn(&mut diagram, export.id, export.instance)?;
            if let Some(properties) = &export.properties {
                diagram.properties_mut(key)?.set_json(properties)?;
            }
            if let Some(bits) = export.attributes {
                diagram.set_attribute(key, Attributes::from_bits_truncate(bits), true)?;
            }
            keys.insert(export.instance, key);
        }
        let resolve = |instance: &InstanceId| {
            keys.get(instance)
                .copied()
                .ok_or(ModelError::MissingObject(*instance))
        };

        // Ownership
        for export in &self.objects {
            let key = resolve(&export.instance)?;
            for child in export.objects.iter().flatten() {
                diagram.add_child(key, resolve(child)?, None)?;
            }
            for (position, anchor) in export.anchors.iter().flatten() {
                diagram.add_anchor(key, position, resolve(anchor)?)?;
            }
            if let Some(source) = &export.source {
                diagram.set_endpoint(key, Endpoint::Source, Some(resolve(source)?))?;
            }
            if let Some(target) = &export.target {
                diagram.set_endpoint(key, Endpoint::Target, Some(resolve(target)?))?;
            }
            for handle in export.handles.iter().flatten() {
                diagram.add_handle(key, resolve(handle)?, None)?;
            }
        }

        let mut roots = keys.values().copied().filter(|key| diagram.parent(*key).is_none());
        let root = match (roots.next(), roots.next()) {
            (None, _) => return Err(ModelError::NoRoot),
            (Some(_), Some(_)) => return Err(ModelError::MultipleRoots),
            (Some(root), None) => root,
        };
        let found = diagram.object(root)?.kind();
        if found != ObjectKind::Canvas {
            return Err(ModelError::WrongKind {
                expected: ObjectKind::Canvas,
                found,
            });
        }

        // Template-declared children missing from the file
        for key in keys.values().copied() {
            factory.complete(&mut diagram, key)?;
        }

        // Links
        let mut links = 0usize;
        for export in &self.objects {
            let anchor = resolve(&export.instance)?;
            for latch in export.latches.iter().flatten() {
                diagram.link(anchor, resolve(latch)?)?;
                links += 1;
            }
        }

        info!(objects = diagram.len(), links = links; "Diagram imported");
        Ok((diagram, root))
    }
}
