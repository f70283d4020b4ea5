//! Error types for the diagram and property model.
//!
//! Every variant of [`ModelError`] is raised before any shared state is
//! mutated, so a failed operation leaves the diagram exactly as it was.

use thiserror::Error;

use crate::{diagram::ObjectKind, identifier::InstanceId};

/// Errors raised by diagram, property, catalog, and file operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("'{child}' already parented to '{parent}'")]
    AlreadyParented {
        child: InstanceId,
        parent: InstanceId,
    },

    #[error("{parent} objects cannot contain {child} objects")]
    UnsupportedChild {
        parent: ObjectKind,
        child: ObjectKind,
    },

    #[error("Position '{position}' on '{owner}' is already occupied")]
    PositionOccupied { owner: InstanceId, position: String },

    #[error("'{child}' is not a child of '{parent}'")]
    NotAChild {
        parent: InstanceId,
        child: InstanceId,
    },

    #[error("Object '{0}' must be detached before it can be deleted")]
    StillParented(InstanceId),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Expected a {expected} object, found {found}")]
    WrongKind {
        expected: ObjectKind,
        found: ObjectKind,
    },

    #[error("Instance '{0}' already exists in this diagram")]
    DuplicateInstance(InstanceId),

    #[error("Key '{0}' is already assigned")]
    DuplicateKey(String),

    #[error("Unknown template: '{0}'")]
    UnknownTemplate(String),

    #[error("Invalid property descriptor '{id}': {reason}")]
    InvalidDescriptor { id: String, reason: String },

    #[error("Value for '{id}' has the wrong shape: expected {expected}")]
    ValueShape { id: String, expected: &'static str },

    #[error("Object '{0}' missing from export")]
    MissingObject(InstanceId),

    #[error("File export includes multiple root objects")]
    MultipleRoots,

    #[error("File export includes no root object")]
    NoRoot,

    #[error("Unsupported diagram file schema: '{0}'")]
    UnsupportedSchema(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
