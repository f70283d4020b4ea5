//! Threatflow Core Types and Definitions
//!
//! This crate provides the data model behind Threatflow threat-model diagrams:
//!
//! - **Identifiers**: Interned template ids and UUID instance ids ([`identifier`] module)
//! - **Properties**: Typed, self-describing value trees ([`property`] module)
//! - **Diagram**: The owned object tree and its anchor/latch link graph ([`diagram`] module)
//! - **Templates**: The catalog describing every object kind ([`template`] module)
//! - **Factory**: Template-driven object creation ([`factory::DiagramFactory`])
//! - **File**: The diagram file format ([`file::DiagramFile`])

pub mod diagram;
pub mod error;
pub mod factory;
pub mod file;
pub mod identifier;
pub mod property;
pub mod template;

pub use error::ModelError;
