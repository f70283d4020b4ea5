//! Builds diagram objects from catalog templates.

use chrono_tz::Tz;
use log::trace;

use crate::{
    diagram::{Diagram, DiagramObject, Endpoint, ObjectKey, ObjectKind},
    error::ModelError,
    identifier::{InstanceId, TemplateId},
    template::TemplateCatalog,
};

/// Creates diagram objects from the templates of one catalog.
#[derive(Debug, Clone, Copy)]
pub struct DiagramFactory<'c> {
    catalog: &'c TemplateCatalog,
    zone: Tz,
}

impl<'c> DiagramFactory<'c> {
    pub fn new(catalog: &'c TemplateCatalog) -> Self {
        Self {
            catalog,
            zone: Tz::UTC,
        }
    }

    /// Sets the zone new date properties start out in.
    ///
    /// Dates read later without an explicit zone are interpreted in it.
    pub fn with_zone(mut self, zone: Tz) -> Self {
        self.zone = zone;
        self
    }

    pub fn catalog(&self) -> &'c TemplateCatalog {
        self.catalog
    }

    /// Creates a complete object: default properties, plus the anchors of a
    /// block or the endpoint latches of a line.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownTemplate`] if `template` (or one of the
    /// anchor and latch templates it names) is not in the catalog.
    pub fn create(&self, diagram: &mut Diagram, template: TemplateId) -> Result<ObjectKey, ModelError> {
        let key = self.spawn(diagram, template, InstanceId::generate())?;
        self.complete(diagram, key)?;
        Ok(key)
    }

    /// Creates a new diagram containing a single canvas.
    pub fn create_canvas(&self, diagram: &mut Diagram) -> Result<ObjectKey, ModelError> {
        let template = self
            .catalog
            .canvas_template()
            .ok_or_else(|| ModelError::UnknownTemplate("<canvas>".to_string()))?;
        self.create(diagram, template)
    }

    /// Creates a bare object with default properties and no children.
    pub fn spawn(
        &self,
        diagram: &mut Diagram,
        template: TemplateId,
        instance: InstanceId,
    ) -> Result<ObjectKey, ModelError> {
        let layout = self.catalog.get(template)?;
        let properties = layout.build_properties(self.zone)?;
        trace!(template:% = template, instance:% = instance; "Spawning object");
        diagram.insert(DiagramObject::new(template, instance, layout.kind, properties))
    }

    /// Adds whatever template-declared children `key` is still missing:
    /// anchors at unfilled block positions and empty line endpoint slots.
    pub fn complete(&self, diagram: &mut Diagram, key: ObjectKey) -> Result<(), ModelError> {
        let object = diagram.object(key)?;
        let layout = self.catalog.get(object.template())?;
        match object.kind() {
            ObjectKind::Block => {
                let missing: Vec<(String, TemplateId)> = layout
                    .anchors
                    .iter()
                    .filter(|(position, _)| {
                        object
                            .as_block()
                            .is_some_and(|block| block.anchor(position).is_none())
                    })
                    .map(|(position, id)| (position.clone(), *id))
                    .collect();
                for (position, anchor_template) in missing {
                    let anchor = self.spawn(diagram, anchor_template, InstanceId::generate())?;
                    diagram.add_anchor(key, &position, anchor)?;
                }
            }
            ObjectKind::Line => {
                let slots = [
                    (Endpoint::Source, layout.source_latch),
                    (Endpoint::Target, layout.target_latch),
                ];
                for (endpoint, latch_template) in slots {
                    let Some(latch_template) = latch_template else {
                        continue;
                    };
                    if diagram.endpoint(key, endpoint).is_none() {
                        let latch = self.spawn(diagram, latch_template, InstanceId::generate())?;
                        diagram.set_endpoint(key, endpoint, Some(latch))?;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Adds a bend handle to a line, using the line template's handle.
    pub fn add_handle(
        &self,
        diagram: &mut Diagram,
        line: ObjectKey,
        index: Option<usize>,
    ) -> Result<ObjectKey, ModelError> {
        let layout = self.catalog.get(diagram.object(line)?.template())?;
        let template = layout
            .handle
            .ok_or_else(|| ModelError::UnknownTemplate("<handle>".to_string()))?;
        let handle = self.spawn(diagram, template, InstanceId::generate())?;
        diagram.add_handle(line, handle, index)?;
        Ok(handle)
    }
}
