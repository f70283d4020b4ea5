//! Diagram objects and their kind-specific bodies.

use std::fmt;

use bitflags::bitflags;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::{
    identifier::{InstanceId, TemplateId},
    property::RootProperty,
};

new_key_type! {
    /// Arena handle of an object inside a [`Diagram`](super::Diagram).
    pub struct ObjectKey;
}

bitflags! {
    /// Per-object state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attributes: u32 {
        /// The user placed the object explicitly.
        const POSITION_SET = 1 << 0;
        /// The object is part of the current selection.
        const SELECTED = 1 << 1;
    }
}

/// The closed set of diagram object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Canvas,
    Group,
    Block,
    Anchor,
    Latch,
    Line,
    Handle,
}

impl ObjectKind {
    /// Whether objects of this kind own blocks and lines.
    pub fn is_group(self) -> bool {
        matches!(self, ObjectKind::Canvas | ObjectKind::Group)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Canvas => "canvas",
            ObjectKind::Group => "group",
            ObjectKind::Block => "block",
            ObjectKind::Anchor => "anchor",
            ObjectKind::Latch => "latch",
            ObjectKind::Line => "line",
            ObjectKind::Handle => "handle",
        };
        f.write_str(name)
    }
}

/// Blocks and lines owned by a canvas or group, in separate orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBody {
    pub(crate) blocks: Vec<ObjectKey>,
    pub(crate) lines: Vec<ObjectKey>,
}

impl GroupBody {
    pub fn blocks(&self) -> &[ObjectKey] {
        &self.blocks
    }

    pub fn lines(&self) -> &[ObjectKey] {
        &self.lines
    }
}

/// Anchors owned by a block, one per position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockBody {
    pub(crate) anchors: IndexMap<String, ObjectKey>,
}

impl BlockBody {
    pub fn anchors(&self) -> impl Iterator<Item = (&str, ObjectKey)> {
        self.anchors.iter().map(|(p, k)| (p.as_str(), *k))
    }

    pub fn anchor(&self, position: &str) -> Option<ObjectKey> {
        self.anchors.get(position).copied()
    }
}

/// Endpoint latches and bend handles owned by a line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBody {
    pub(crate) source: Option<ObjectKey>,
    pub(crate) target: Option<ObjectKey>,
    pub(crate) handles: Vec<ObjectKey>,
}

impl LineBody {
    pub fn source(&self) -> Option<ObjectKey> {
        self.source
    }

    pub fn target(&self) -> Option<ObjectKey> {
        self.target
    }

    pub fn handles(&self) -> &[ObjectKey] {
        &self.handles
    }
}

/// Kind-specific structure of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectBody {
    Canvas(GroupBody),
    Group(GroupBody),
    Block(BlockBody),
    /// Latches linked to this anchor. Not owned.
    Anchor { latches: Vec<ObjectKey> },
    /// The anchor this latch is linked to. Not owned.
    Latch { anchor: Option<ObjectKey> },
    Line(LineBody),
    Handle,
}

impl ObjectBody {
    /// Creates an empty body of the given kind.
    pub fn empty(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Canvas => ObjectBody::Canvas(GroupBody::default()),
            ObjectKind::Group => ObjectBody::Group(GroupBody::default()),
            ObjectKind::Block => ObjectBody::Block(BlockBody::default()),
            ObjectKind::Anchor => ObjectBody::Anchor {
                latches: Vec::new(),
            },
            ObjectKind::Latch => ObjectBody::Latch { anchor: None },
            ObjectKind::Line => ObjectBody::Line(LineBody::default()),
            ObjectKind::Handle => ObjectBody::Handle,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            ObjectBody::Canvas(_) => ObjectKind::Canvas,
            ObjectBody::Group(_) => ObjectKind::Group,
            ObjectBody::Block(_) => ObjectKind::Block,
            ObjectBody::Anchor { .. } => ObjectKind::Anchor,
            ObjectBody::Latch { .. } => ObjectKind::Latch,
            ObjectBody::Line(_) => ObjectKind::Line,
            ObjectBody::Handle => ObjectKind::Handle,
        }
    }

    pub(crate) fn group(&self) -> Option<&GroupBody> {
        match self {
            ObjectBody::Canvas(group) | ObjectBody::Group(group) => Some(group),
            _ => None,
        }
    }
}

/// One element of a diagram.
///
/// Objects are stored in a [`Diagram`](super::Diagram) arena; parent and
/// link references are arena keys. All structural changes go through the
/// diagram so both sides of every reference stay consistent.
#[derive(Debug)]
pub struct DiagramObject {
    pub(crate) template: TemplateId,
    pub(crate) instance: InstanceId,
    pub(crate) attributes: Attributes,
    pub(crate) properties: RootProperty,
    pub(crate) parent: Option<ObjectKey>,
    pub(crate) body: ObjectBody,
}

impl DiagramObject {
    /// Creates a detached object with an empty body.
    pub fn new(
        template: TemplateId,
        instance: InstanceId,
        kind: ObjectKind,
        properties: RootProperty,
    ) -> Self {
        Self {
            template,
            instance,
            attributes: Attributes::empty(),
            properties,
            parent: None,
            body: ObjectBody::empty(kind),
        }
    }

    pub fn template(&self) -> TemplateId {
        self.template
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn kind(&self) -> ObjectKind {
        self.body.kind()
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn is_set(&self, mask: Attributes) -> bool {
        self.attributes.contains(mask)
    }

    pub fn properties(&self) -> &RootProperty {
        &self.properties
    }

    pub fn parent(&self) -> Option<ObjectKey> {
        self.parent
    }

    pub fn body(&self) -> &ObjectBody {
        &self.body
    }

    /// Returns the group body of a canvas or group.
    pub fn as_group(&self) -> Option<&GroupBody> {
        self.body.group()
    }

    pub fn as_block(&self) -> Option<&BlockBody> {
        match &self.body {
            ObjectBody::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineBody> {
        match &self.body {
            ObjectBody::Line(line) => Some(line),
            _ => None,
        }
    }

    /// Latches linked to an anchor; empty for other kinds.
    pub fn linked_latches(&self) -> &[ObjectKey] {
        match &self.body {
            ObjectBody::Anchor { latches } => latches,
            _ => &[],
        }
    }

    /// The anchor a latch is linked to.
    pub fn linked_anchor(&self) -> Option<ObjectKey> {
        match &self.body {
            ObjectBody::Latch { anchor } => *anchor,
            _ => None,
        }
    }
}
