//! The diagram object graph.
//!
//! A [`Diagram`] is an arena of [`DiagramObject`]s addressed by
//! [`ObjectKey`]. Two structures live in it:
//!
//! - The ownership tree: canvases and groups own blocks and lines, blocks own
//!   anchors (one per position), and lines own their two endpoint latches and
//!   their handles. Every object has at most one parent.
//! - The link graph: a latch links to at most one anchor, and each anchor
//!   lists the latches linked to it. Both sides are always updated together.
//!
//! Every operation validates its inputs before touching the arena, so an
//! `Err` leaves the diagram unchanged.

mod clone;
mod object;

pub use clone::{CloneFilter, InstanceMap};
pub use object::{
    Attributes, BlockBody, DiagramObject, GroupBody, LineBody, ObjectBody, ObjectKey, ObjectKind,
};

use std::collections::HashMap;

use log::trace;
use slotmap::SlotMap;

use crate::{error::ModelError, identifier::InstanceId, property::RootProperty};

/// Which endpoint slot of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

/// Arena holding every object of one diagram.
#[derive(Debug, Default)]
pub struct Diagram {
    objects: SlotMap<ObjectKey, DiagramObject>,
    instances: HashMap<InstanceId, ObjectKey>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    // =========================================================================
    // Storage and lookup
    // =========================================================================

    /// Adds a detached object to the arena.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::DuplicateInstance`] if an object with the same
    /// instance id is already stored.
    pub fn insert(&mut self, object: DiagramObject) -> Result<ObjectKey, ModelError> {
        let instance = object.instance;
        if self.instances.contains_key(&instance) {
            return Err(ModelError::DuplicateInstance(instance));
        }
        trace!(instance:% = instance, template:% = object.template; "Object inserted");
        let key = self.objects.insert(object);
        self.instances.insert(instance, key);
        Ok(key)
    }

    pub fn get(&self, key: ObjectKey) -> Option<&DiagramObject> {
        self.objects.get(key)
    }

    /// Like [`Diagram::get`], but missing objects are an error.
    pub fn object(&self, key: ObjectKey) -> Result<&DiagramObject, ModelError> {
        self.objects
            .get(key)
            .ok_or_else(|| ModelError::NotFound(format!("{key:?}")))
    }

    fn object_mut(&mut self, key: ObjectKey) -> Result<&mut DiagramObject, ModelError> {
        self.objects
            .get_mut(key)
            .ok_or_else(|| ModelError::NotFound(format!("{key:?}")))
    }

    pub fn key_of(&self, instance: InstanceId) -> Option<ObjectKey> {
        self.instances.get(&instance).copied()
    }

    pub fn find(&self, instance: InstanceId) -> Option<&DiagramObject> {
        self.key_of(instance).and_then(|key| self.objects.get(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectKey, &DiagramObject)> {
        self.objects.iter()
    }

    /// Objects without a parent.
    pub fn roots(&self) -> impl Iterator<Item = ObjectKey> + '_ {
        self.objects
            .iter()
            .filter(|(_, object)| object.parent.is_none())
            .map(|(key, _)| key)
    }

    /// Mutable access to an object's property tree.
    pub fn properties_mut(&mut self, key: ObjectKey) -> Result<&mut RootProperty, ModelError> {
        Ok(&mut self.object_mut(key)?.properties)
    }

    pub fn set_attribute(
        &mut self,
        key: ObjectKey,
        mask: Attributes,
        value: bool,
    ) -> Result<(), ModelError> {
        self.object_mut(key)?.attributes.set(mask, value);
        Ok(())
    }

    fn expect_kind(&self, key: ObjectKey, expected: ObjectKind) -> Result<(), ModelError> {
        let found = self.object(key)?.kind();
        if found != expected {
            return Err(ModelError::WrongKind { expected, found });
        }
        Ok(())
    }

    /// Fails if `child` has a parent other than `owner`.
    fn ensure_free_for(&self, child: ObjectKey, owner: ObjectKey) -> Result<(), ModelError> {
        match self.object(child)?.parent {
            Some(parent) if parent != owner => Err(ModelError::AlreadyParented {
                child: self.object(child)?.instance,
                parent: self.object(parent)?.instance,
            }),
            _ => Ok(()),
        }
    }

    fn ensure_detached(&self, child: ObjectKey) -> Result<(), ModelError> {
        match self.object(child)?.parent {
            Some(parent) => Err(ModelError::AlreadyParented {
                child: self.object(child)?.instance,
                parent: self.object(parent)?.instance,
            }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Ownership tree
    // =========================================================================

    /// Inserts `child` into the matching sequence of `parent`.
    ///
    /// Canvases and groups accept blocks and lines (kept in separate orders);
    /// lines accept handles. A child already owned by `parent` is moved to
    /// `index`. Indices past the end append.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnsupportedChild`] if `parent` cannot hold `child`'s kind,
    /// and [`ModelError::AlreadyParented`] if another object owns `child`.
    pub fn add_child(
        &mut self,
        parent: ObjectKey,
        child: ObjectKey,
        index: Option<usize>,
    ) -> Result<(), ModelError> {
        let parent_kind = self.object(parent)?.kind();
        let child_kind = self.object(child)?.kind();
        let accepted = match child_kind {
            ObjectKind::Block | ObjectKind::Line => parent_kind.is_group(),
            ObjectKind::Handle => parent_kind == ObjectKind::Line,
            _ => false,
        };
        if !accepted || parent == child {
            return Err(ModelError::UnsupportedChild {
                parent: parent_kind,
                child: child_kind,
            });
        }
        self.ensure_free_for(child, parent)?;

        let sequence = self
            .sequence_mut(parent, child_kind)
            .ok_or(ModelError::UnsupportedChild {
                parent: parent_kind,
                child: child_kind,
            })?;
        if let Some(existing) = sequence.iter().position(|k| *k == child) {
            sequence.remove(existing);
        }
        let index = index.unwrap_or(sequence.len()).min(sequence.len());
        sequence.insert(index, child);
        self.objects[child].parent = Some(parent);
        Ok(())
    }

    fn sequence_mut(&mut self, parent: ObjectKey, child_kind: ObjectKind) -> Option<&mut Vec<ObjectKey>> {
        let body = &mut self.objects.get_mut(parent)?.body;
        match (body, child_kind) {
            (ObjectBody::Canvas(group) | ObjectBody::Group(group), ObjectKind::Block) => {
                Some(&mut group.blocks)
            }
            (ObjectBody::Canvas(group) | ObjectBody::Group(group), ObjectKind::Line) => {
                Some(&mut group.lines)
            }
            (ObjectBody::Line(line), ObjectKind::Handle) => Some(&mut line.handles),
            _ => None,
        }
    }

    /// Detaches `child` from `parent`, whichever slot holds it.
    ///
    /// Links are left intact; a detached subtree can be re-attached or
    /// destroyed with [`Diagram::delete`].
    pub fn remove_child(&mut self, parent: ObjectKey, child: ObjectKey) -> Result<(), ModelError> {
        if self.object(child)?.parent != Some(parent) {
            return Err(ModelError::NotAChild {
                parent: self.object(parent)?.instance,
                child: self.object(child)?.instance,
            });
        }
        match &mut self.object_mut(parent)?.body {
            ObjectBody::Canvas(group) | ObjectBody::Group(group) => {
                group.blocks.retain(|k| *k != child);
                group.lines.retain(|k| *k != child);
            }
            ObjectBody::Block(block) => block.anchors.retain(|_, k| *k != child),
            ObjectBody::Line(line) => {
                if line.source == Some(child) {
                    line.source = None;
                }
                if line.target == Some(child) {
                    line.target = None;
                }
                line.handles.retain(|k| *k != child);
            }
            _ => {}
        }
        self.objects[child].parent = None;
        Ok(())
    }

    /// Places `anchor` on `block` at `position`.
    ///
    /// # Errors
    ///
    /// [`ModelError::PositionOccupied`] if the block already has an anchor at
    /// `position`.
    pub fn add_anchor(
        &mut self,
        block: ObjectKey,
        position: &str,
        anchor: ObjectKey,
    ) -> Result<(), ModelError> {
        self.expect_kind(block, ObjectKind::Block)?;
        self.expect_kind(anchor, ObjectKind::Anchor)?;
        self.ensure_detached(anchor)?;
        let owner = self.object(block)?;
        if owner.as_block().and_then(|b| b.anchor(position)).is_some() {
            return Err(ModelError::PositionOccupied {
                owner: owner.instance,
                position: position.to_string(),
            });
        }
        if let ObjectBody::Block(body) = &mut self.objects[block].body {
            body.anchors.insert(position.to_string(), anchor);
        }
        self.objects[anchor].parent = Some(block);
        Ok(())
    }

    /// Detaches and returns the anchor at `position`.
    pub fn remove_anchor(
        &mut self,
        block: ObjectKey,
        position: &str,
    ) -> Result<Option<ObjectKey>, ModelError> {
        self.expect_kind(block, ObjectKind::Block)?;
        let removed = match &mut self.objects[block].body {
            ObjectBody::Block(body) => body.anchors.shift_remove(position),
            _ => None,
        };
        if let Some(anchor) = removed {
            self.objects[anchor].parent = None;
        }
        Ok(removed)
    }

    pub fn set_source_latch(
        &mut self,
        line: ObjectKey,
        latch: Option<ObjectKey>,
    ) -> Result<Option<ObjectKey>, ModelError> {
        self.set_endpoint(line, Endpoint::Source, latch)
    }

    pub fn set_target_latch(
        &mut self,
        line: ObjectKey,
        latch: Option<ObjectKey>,
    ) -> Result<Option<ObjectKey>, ModelError> {
        self.set_endpoint(line, Endpoint::Target, latch)
    }

    /// Installs `latch` as a line endpoint, returning the detached previous one.
    pub fn set_endpoint(
        &mut self,
        line: ObjectKey,
        endpoint: Endpoint,
        latch: Option<ObjectKey>,
    ) -> Result<Option<ObjectKey>, ModelError> {
        self.expect_kind(line, ObjectKind::Line)?;
        let current = self.endpoint(line, endpoint);
        if latch.is_some() && latch == current {
            return Ok(None);
        }
        if let Some(latch) = latch {
            self.expect_kind(latch, ObjectKind::Latch)?;
            self.ensure_detached(latch)?;
        }

        if let ObjectBody::Line(body) = &mut self.objects[line].body {
            match endpoint {
                Endpoint::Source => body.source = latch,
                Endpoint::Target => body.target = latch,
            }
        }
        if let Some(previous) = current {
            self.objects[previous].parent = None;
        }
        if let Some(latch) = latch {
            self.objects[latch].parent = Some(line);
        }
        Ok(current)
    }

    /// The latch in a line's endpoint slot.
    pub fn endpoint(&self, line: ObjectKey, endpoint: Endpoint) -> Option<ObjectKey> {
        let body = self.objects.get(line)?.as_line()?;
        match endpoint {
            Endpoint::Source => body.source,
            Endpoint::Target => body.target,
        }
    }

    pub fn add_handle(
        &mut self,
        line: ObjectKey,
        handle: ObjectKey,
        index: Option<usize>,
    ) -> Result<(), ModelError> {
        self.expect_kind(line, ObjectKind::Line)?;
        self.add_child(line, handle, index)
    }

    pub fn remove_handle(&mut self, line: ObjectKey, handle: ObjectKey) -> Result<(), ModelError> {
        self.expect_kind(handle, ObjectKind::Handle)?;
        self.remove_child(line, handle)
    }

    /// Detaches every handle from index `from` onward and returns them in order.
    pub fn drop_handles(&mut self, line: ObjectKey, from: usize) -> Result<Vec<ObjectKey>, ModelError> {
        self.expect_kind(line, ObjectKind::Line)?;
        let dropped = match &mut self.objects[line].body {
            ObjectBody::Line(body) if from < body.handles.len() => body.handles.split_off(from),
            _ => Vec::new(),
        };
        for handle in &dropped {
            self.objects[*handle].parent = None;
        }
        Ok(dropped)
    }

    /// Destroys a detached object and everything it owns.
    ///
    /// Links into or out of the subtree are removed first, so no surviving
    /// object references a deleted one.
    ///
    /// # Errors
    ///
    /// [`ModelError::StillParented`] if the object still has a parent.
    pub fn delete(&mut self, key: ObjectKey) -> Result<(), ModelError> {
        let object = self.object(key)?;
        if object.parent.is_some() {
            return Err(ModelError::StillParented(object.instance));
        }
        let subtree = self.subtree(key);
        for &member in &subtree {
            match &self.objects[member].body {
                ObjectBody::Latch { anchor: Some(_) } => {
                    self.unlink(member)?;
                }
                ObjectBody::Anchor { latches } => {
                    for latch in latches.clone() {
                        self.unlink(latch)?;
                    }
                }
                _ => {}
            }
        }
        for member in &subtree {
            if let Some(object) = self.objects.remove(*member) {
                self.instances.remove(&object.instance);
            }
        }
        trace!(objects = subtree.len(); "Deleted object subtree");
        Ok(())
    }

    // =========================================================================
    // Link graph
    // =========================================================================

    /// Links `latch` to `anchor`.
    ///
    /// Linking an already-linked pair does nothing; a latch linked elsewhere
    /// is moved.
    pub fn link(&mut self, anchor: ObjectKey, latch: ObjectKey) -> Result<(), ModelError> {
        self.expect_kind(anchor, ObjectKind::Anchor)?;
        self.expect_kind(latch, ObjectKind::Latch)?;
        let previous = self.objects[latch].linked_anchor();
        if previous == Some(anchor) {
            return Ok(());
        }
        if previous.is_some() {
            self.unlink(latch)?;
        }
        if let ObjectBody::Anchor { latches } = &mut self.objects[anchor].body {
            latches.push(latch);
        }
        if let ObjectBody::Latch { anchor: slot } = &mut self.objects[latch].body {
            *slot = Some(anchor);
        }
        Ok(())
    }

    /// Unlinks `latch` from its anchor, returning the anchor.
    pub fn unlink(&mut self, latch: ObjectKey) -> Result<Option<ObjectKey>, ModelError> {
        self.expect_kind(latch, ObjectKind::Latch)?;
        let previous = match &mut self.objects[latch].body {
            ObjectBody::Latch { anchor } => anchor.take(),
            _ => None,
        };
        let anchor_body = previous
            .and_then(|anchor| self.objects.get_mut(anchor))
            .map(|object| &mut object.body);
        if let Some(ObjectBody::Anchor { latches }) = anchor_body {
            latches.retain(|k| *k != latch);
        }
        Ok(previous)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn parent(&self, key: ObjectKey) -> Option<ObjectKey> {
        self.objects.get(key)?.parent
    }

    /// Owned children in draw order.
    ///
    /// Groups list lines before blocks; blocks list anchors; lines list the
    /// source latch, the target latch, then handles.
    pub fn children(&self, key: ObjectKey) -> Vec<ObjectKey> {
        let Some(object) = self.objects.get(key) else {
            return Vec::new();
        };
        match &object.body {
            ObjectBody::Canvas(group) | ObjectBody::Group(group) => {
                group.lines.iter().chain(&group.blocks).copied().collect()
            }
            ObjectBody::Block(block) => block.anchors.values().copied().collect(),
            ObjectBody::Line(line) => line
                .source
                .into_iter()
                .chain(line.target)
                .chain(line.handles.iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Every object owned directly or indirectly by `key`, in pre-order.
    pub fn descendants(&self, key: ObjectKey) -> Vec<ObjectKey> {
        let mut all = self.subtree(key);
        if !all.is_empty() {
            all.remove(0);
        }
        all
    }

    /// `key` followed by its descendants, in pre-order.
    pub(crate) fn subtree(&self, key: ObjectKey) -> Vec<ObjectKey> {
        if !self.objects.contains_key(key) {
            return Vec::new();
        }
        let mut order = Vec::new();
        let mut stack = vec![key];
        while let Some(next) = stack.pop() {
            order.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        order
    }

    /// The block owning the anchor a latch is linked to.
    pub fn attached_block(&self, latch: ObjectKey) -> Option<ObjectKey> {
        let anchor = self.objects.get(latch)?.linked_anchor()?;
        let block = self.objects.get(anchor)?.parent?;
        (self.objects.get(block)?.kind() == ObjectKind::Block).then_some(block)
    }

    /// The position an anchor occupies on its block.
    pub fn anchor_position(&self, anchor: ObjectKey) -> Option<&str> {
        let block = self.objects.get(anchor)?.parent?;
        self.objects
            .get(block)?
            .as_block()?
            .anchors()
            .find(|(_, key)| *key == anchor)
            .map(|(position, _)| position)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        identifier::TemplateId,
        property::{DictionaryProperty, PropertyMeta},
    };

    /// Inserts a bare object of `kind` without going through a catalog.
    pub(crate) fn spawn(diagram: &mut Diagram, kind: ObjectKind, template: &str) -> ObjectKey {
        let object = DiagramObject::new(
            TemplateId::new(template),
            InstanceId::generate(),
            kind,
            RootProperty::new(DictionaryProperty::new(PropertyMeta::new(template))),
        );
        diagram.insert(object).unwrap()
    }

    /// A block with one anchor per position.
    pub(crate) fn spawn_block(diagram: &mut Diagram, template: &str, positions: &[&str]) -> ObjectKey {
        let block = spawn(diagram, ObjectKind::Block, template);
        for position in positions {
            let anchor = spawn(diagram, ObjectKind::Anchor, "anchor");
            diagram.add_anchor(block, position, anchor).unwrap();
        }
        block
    }

    /// A line with both latches installed.
    pub(crate) fn spawn_line(diagram: &mut Diagram) -> ObjectKey {
        let line = spawn(diagram, ObjectKind::Line, "line");
        let source = spawn(diagram, ObjectKind::Latch, "latch");
        let target = spawn(diagram, ObjectKind::Latch, "latch");
        diagram.set_source_latch(line, Some(source)).unwrap();
        diagram.set_target_latch(line, Some(target)).unwrap();
        line
    }

    pub(crate) fn anchor_of(diagram: &Diagram, block: ObjectKey, position: &str) -> ObjectKey {
        diagram
            .get(block)
            .and_then(DiagramObject::as_block)
            .and_then(|b| b.anchor(position))
            .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::{test_support::*, *};

    #[test]
    fn test_group_dispatches_blocks_and_lines() {
        let mut diagram = Diagram::new();
        let canvas = spawn(&mut diagram, ObjectKind::Canvas, "flow");
        let block = spawn_block(&mut diagram, "action", &["n"]);
        let line = spawn_line(&mut diagram);

        diagram.add_child(canvas, block, None).unwrap();
        diagram.add_child(canvas, line, None).unwrap();

        let group = diagram.get(canvas).unwrap().as_group().unwrap();
        assert_eq!(group.blocks(), &[block]);
        assert_eq!(group.lines(), &[line]);
        assert_eq!(diagram.children(canvas), vec![line, block]);
        assert_eq!(diagram.parent(block), Some(canvas));
    }

    #[test]
    fn test_unsupported_child_is_rejected() {
        let mut diagram = Diagram::new();
        let canvas = spawn(&mut diagram, ObjectKind::Canvas, "flow");
        let handle = spawn(&mut diagram, ObjectKind::Handle, "handle");
        let block = spawn(&mut diagram, ObjectKind::Block, "action");

        let err = diagram.add_child(canvas, handle, None).unwrap_err();
        assert!(matches!(
            err,
            ModelError::UnsupportedChild {
                parent: ObjectKind::Canvas,
                child: ObjectKind::Handle
            }
        ));
        assert!(diagram.add_child(block, handle, None).is_err());
        assert_eq!(diagram.parent(handle), None);
    }

    #[test]
    fn test_reparenting_fails_without_mutation() {
        let mut diagram = Diagram::new();
        let first = spawn(&mut diagram, ObjectKind::Canvas, "flow");
        let second = spawn(&mut diagram, ObjectKind::Group, "group");
        let block = spawn(&mut diagram, ObjectKind::Block, "action");

        diagram.add_child(first, block, None).unwrap();
        let err = diagram.add_child(second, block, None).unwrap_err();

        assert!(matches!(err, ModelError::AlreadyParented { .. }));
        assert_eq!(diagram.parent(block), Some(first));
        assert!(diagram.get(second).unwrap().as_group().unwrap().blocks().is_empty());
    }

    #[test]
    fn test_add_child_reorders_within_parent() {
        let mut diagram = Diagram::new();
        let canvas = spawn(&mut diagram, ObjectKind::Canvas, "flow");
        let a = spawn(&mut diagram, ObjectKind::Block, "a");
        let b = spawn(&mut diagram, ObjectKind::Block, "b");
        let c = spawn(&mut diagram, ObjectKind::Block, "c");
        for block in [a, b, c] {
            diagram.add_child(canvas, block, None).unwrap();
        }

        diagram.add_child(canvas, c, Some(0)).unwrap();
        diagram.add_child(canvas, a, Some(99)).unwrap();

        let group = diagram.get(canvas).unwrap().as_group().unwrap();
        assert_eq!(group.blocks(), &[c, b, a]);
    }

    #[test]
    fn test_anchor_position_occupied() {
        let mut diagram = Diagram::new();
        let block = spawn_block(&mut diagram, "action", &["n", "s"]);
        let extra = spawn(&mut diagram, ObjectKind::Anchor, "anchor");

        let err = diagram.add_anchor(block, "n", extra).unwrap_err();
        assert!(matches!(err, ModelError::PositionOccupied { ref position, .. } if position == "n"));

        let removed = diagram.remove_anchor(block, "n").unwrap().unwrap();
        assert_eq!(diagram.parent(removed), None);
        diagram.add_anchor(block, "n", extra).unwrap();
        assert_eq!(diagram.anchor_position(extra), Some("n"));
    }

    #[test]
    fn test_link_is_idempotent_and_moves() {
        let mut diagram = Diagram::new();
        let block = spawn_block(&mut diagram, "action", &["n", "s"]);
        let north = anchor_of(&diagram, block, "n");
        let south = anchor_of(&diagram, block, "s");
        let latch = spawn(&mut diagram, ObjectKind::Latch, "latch");

        diagram.link(north, latch).unwrap();
        diagram.link(north, latch).unwrap();
        assert_eq!(diagram.get(north).unwrap().linked_latches(), &[latch]);

        diagram.link(south, latch).unwrap();
        assert!(diagram.get(north).unwrap().linked_latches().is_empty());
        assert_eq!(diagram.get(south).unwrap().linked_latches(), &[latch]);
        assert_eq!(diagram.attached_block(latch), Some(block));

        assert_eq!(diagram.unlink(latch).unwrap(), Some(south));
        assert!(diagram.get(south).unwrap().linked_latches().is_empty());
        assert_eq!(diagram.attached_block(latch), None);
    }

    #[test]
    fn test_link_rejects_wrong_kinds() {
        let mut diagram = Diagram::new();
        let block = spawn_block(&mut diagram, "action", &["n"]);
        let anchor = anchor_of(&diagram, block, "n");
        let handle = spawn(&mut diagram, ObjectKind::Handle, "handle");

        let err = diagram.link(anchor, handle).unwrap_err();
        assert!(matches!(
            err,
            ModelError::WrongKind {
                expected: ObjectKind::Latch,
                found: ObjectKind::Handle
            }
        ));
    }

    #[test]
    fn test_line_endpoints_and_handles() {
        let mut diagram = Diagram::new();
        let line = spawn_line(&mut diagram);
        let source = diagram.endpoint(line, Endpoint::Source).unwrap();

        let replacement = spawn(&mut diagram, ObjectKind::Latch, "latch");
        let previous = diagram.set_source_latch(line, Some(replacement)).unwrap();
        assert_eq!(previous, Some(source));
        assert_eq!(diagram.parent(source), None);

        let handles: Vec<_> = (0..3)
            .map(|_| spawn(&mut diagram, ObjectKind::Handle, "handle"))
            .collect();
        for handle in &handles {
            diagram.add_handle(line, *handle, None).unwrap();
        }
        diagram.remove_handle(line, handles[0]).unwrap();
        let dropped = diagram.drop_handles(line, 1).unwrap();
        assert_eq!(dropped, vec![handles[2]]);
        assert_eq!(diagram.get(line).unwrap().as_line().unwrap().handles(), &[handles[1]]);
    }

    #[test]
    fn test_delete_requires_detached_and_unlinks() {
        let mut diagram = Diagram::new();
        let canvas = spawn(&mut diagram, ObjectKind::Canvas, "flow");
        let block = spawn_block(&mut diagram, "action", &["n"]);
        let line = spawn_line(&mut diagram);
        diagram.add_child(canvas, block, None).unwrap();
        diagram.add_child(canvas, line, None).unwrap();
        let anchor = anchor_of(&diagram, block, "n");
        let source = diagram.endpoint(line, Endpoint::Source).unwrap();
        diagram.link(anchor, source).unwrap();

        let err = diagram.delete(block).unwrap_err();
        assert!(matches!(err, ModelError::StillParented(_)));

        diagram.remove_child(canvas, block).unwrap();
        diagram.delete(block).unwrap();

        assert!(diagram.get(block).is_none());
        assert!(diagram.get(anchor).is_none());
        assert_eq!(diagram.get(source).unwrap().linked_anchor(), None);
        assert_eq!(diagram.len(), 4);
    }

    #[test]
    fn test_descendants_pre_order() {
        let mut diagram = Diagram::new();
        let canvas = spawn(&mut diagram, ObjectKind::Canvas, "flow");
        let block = spawn_block(&mut diagram, "action", &["n"]);
        let line = spawn_line(&mut diagram);
        diagram.add_child(canvas, block, None).unwrap();
        diagram.add_child(canvas, line, None).unwrap();

        let descendants = diagram.descendants(canvas);
        assert_eq!(descendants.len(), 5);
        assert_eq!(descendants[0], line);
        assert_eq!(descendants[3], block);
        assert!(diagram.roots().eq([canvas]));
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let mut diagram = Diagram::new();
        let key = spawn(&mut diagram, ObjectKind::Handle, "handle");
        let object = diagram.get(key).unwrap();
        let copy = DiagramObject::new(
            object.template(),
            object.instance(),
            ObjectKind::Handle,
            object.properties().clone(),
        );
        assert!(matches!(
            diagram.insert(copy),
            Err(ModelError::DuplicateInstance(_))
        ));
    }
}
