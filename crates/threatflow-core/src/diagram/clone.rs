//! Isolated and deep cloning of diagram objects.

use indexmap::IndexMap;
use log::debug;

use super::{Diagram, DiagramObject, ObjectBody, ObjectKey};
use crate::{error::ModelError, identifier::InstanceId};

/// Original instance id to clone instance id, in clone order.
pub type InstanceMap = IndexMap<InstanceId, InstanceId>;

/// Optional predicate choosing which children of a group are cloned.
pub type CloneFilter<'a> = Option<&'a dyn Fn(&DiagramObject) -> bool>;

impl Diagram {
    /// Clones a single object: same template, properties, and attributes, a
    /// fresh instance id, no children, and no links.
    pub fn isolated_clone(&mut self, key: ObjectKey) -> Result<ObjectKey, ModelError> {
        let source = self.object(key)?;
        let mut object = DiagramObject::new(
            source.template,
            InstanceId::generate(),
            source.kind(),
            source.properties.clone(),
        );
        object.attributes = source.attributes;
        self.insert(object)
    }

    /// Deep-clones `key` and everything it owns.
    ///
    /// `filter` selects which blocks and lines of each group are included.
    /// Anchor/latch links are re-created between clones wherever both ends
    /// were cloned; a latch whose anchor was left out ends up unlinked.
    ///
    /// Returns the clone's key and the instance remapping of every cloned
    /// object.
    pub fn clone_object(
        &mut self,
        key: ObjectKey,
        filter: CloneFilter<'_>,
    ) -> Result<(ObjectKey, InstanceMap), ModelError> {
        let mut instances = InstanceMap::new();
        let mut keys = IndexMap::new();
        let result = self
            .clone_tree(key, filter, &mut instances, &mut keys)
            .and_then(|root| Ok((root, self.relink_clones(&keys)?)));

        match result {
            Ok((root, relinked)) => {
                debug!(objects = instances.len(), links = relinked; "Cloned object tree");
                Ok((root, instances))
            }
            Err(err) => {
                self.discard_clones(keys.values().copied());
                Err(err)
            }
        }
    }

    /// Links each cloned latch to the clone of its original anchor.
    fn relink_clones(&mut self, keys: &IndexMap<ObjectKey, ObjectKey>) -> Result<usize, ModelError> {
        let mut relinked = 0usize;
        for (&original, &copy) in keys {
            let Some(anchor) = self.object(original)?.linked_anchor() else {
                continue;
            };
            if let Some(&anchor_copy) = keys.get(&anchor) {
                self.link(anchor_copy, copy)?;
                relinked += 1;
            }
        }
        Ok(relinked)
    }

    /// Removes the copies of a failed clone. Copies only reference each
    /// other, so nothing outside them is touched.
    fn discard_clones(&mut self, copies: impl Iterator<Item = ObjectKey>) {
        let mut removed = 0usize;
        for copy in copies {
            if let Some(object) = self.objects.remove(copy) {
                self.instances.remove(&object.instance);
                removed += 1;
            }
        }
        debug!(objects = removed; "Discarded partial clone");
    }

    fn clone_tree(
        &mut self,
        key: ObjectKey,
        filter: CloneFilter<'_>,
        instances: &mut InstanceMap,
        keys: &mut IndexMap<ObjectKey, ObjectKey>,
    ) -> Result<ObjectKey, ModelError> {
        let copy = self.isolated_clone(key)?;
        instances.insert(self.object(key)?.instance, self.object(copy)?.instance);
        keys.insert(key, copy);

        match self.object(key)?.body.clone() {
            ObjectBody::Canvas(group) | ObjectBody::Group(group) => {
                for child in group.blocks.iter().chain(&group.lines).copied() {
                    let included = match filter {
                        Some(filter) => filter(self.object(child)?),
                        None => true,
                    };
                    if included {
                        let child_copy = self.clone_tree(child, filter, instances, keys)?;
                        self.add_child(copy, child_copy, None)?;
                    }
                }
            }
            ObjectBody::Block(block) => {
                for (position, anchor) in &block.anchors {
                    let anchor_copy = self.clone_tree(*anchor, filter, instances, keys)?;
                    self.add_anchor(copy, position, anchor_copy)?;
                }
            }
            ObjectBody::Line(line) => {
                if let Some(source) = line.source {
                    let latch = self.clone_tree(source, filter, instances, keys)?;
                    self.set_source_latch(copy, Some(latch))?;
                }
                if let Some(target) = line.target {
                    let latch = self.clone_tree(target, filter, instances, keys)?;
                    self.set_target_latch(copy, Some(latch))?;
                }
                for handle in &line.handles {
                    let handle_copy = self.clone_tree(*handle, filter, instances, keys)?;
                    self.add_child(copy, handle_copy, None)?;
                }
            }
            ObjectBody::Anchor { .. } | ObjectBody::Latch { .. } | ObjectBody::Handle => {}
        }
        Ok(copy)
    }
}
