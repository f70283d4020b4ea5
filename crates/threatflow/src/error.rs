//! Error types for Threatflow operations.
//!
//! This module provides the main error type [`FlowError`] which wraps the
//! error conditions of every pipeline stage, and [`PublishError`] for the
//! publishing engine itself.

use std::io;

use thiserror::Error;

use threatflow_core::{ModelError, property::PropertyKind};

/// Errors raised while publishing a semantic graph.
///
/// Every variant aborts the whole publish; no partial bundle is produced.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Canvas object missing from the semantic graph")]
    MissingCanvas,

    #[error("'{object}' has no '{field}' property")]
    MissingField { object: String, field: String },

    #[error("'{field}' is improperly defined: expected {expected}, found {found}")]
    ShapeMismatch {
        field: String,
        expected: &'static str,
        found: PropertyKind,
    },

    #[error("Unable to compute start refs: every action is preceded by another (does the flow contain a cycle?)")]
    NoStartRefs,

    #[error("Failed to serialize bundle: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PublishError {
    pub(crate) fn shape(field: &str, expected: &'static str, found: PropertyKind) -> Self {
        Self::ShapeMismatch {
            field: field.to_string(),
            expected,
            found,
        }
    }
}

/// The main error type for Threatflow operations.
///
/// # Diagnostic Variants
///
/// The `Json` variant keeps the source text of the file that failed to parse,
/// so the line and column of the error can be shown in context.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{err}")]
    Json {
        err: serde_json::Error,
        src: String,
    },

    #[error("Diagram error: {0}")]
    Model(#[from] ModelError),

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FlowError {
    /// Create a new `Json` error with the associated source text.
    pub fn new_json_error(err: serde_json::Error, src: impl Into<String>) -> Self {
        Self::Json {
            err,
            src: src.into(),
        }
    }
}
