//! CLI logic for the Threatflow publisher.
//!
//! Reads a diagram file, publishes it as a STIX 2.1 bundle, and writes the
//! bundle next to the input unless an output path is given.

pub mod error_adapter;

mod args;
mod config;

pub use args::Args;
pub use error_adapter::ErrorAdapter;

use std::fs;

use log::info;

use threatflow::{FlowError, FlowPublisher};

/// Run the Threatflow CLI application
///
/// # Errors
///
/// Returns `FlowError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed diagram files
/// - Publishing errors
pub fn run(args: &Args) -> Result<(), FlowError> {
    let output = args.output_path();
    info!(
        input_path = args.input,
        output_path = output;
        "Processing diagram"
    );

    let app_config = config::load_config(args.config.as_ref())?;

    let source = fs::read_to_string(&args.input)?;

    let publisher = FlowPublisher::new(app_config)?;
    let document = publisher.load(&source)?;
    let bundle = publisher.publish(&document)?;

    fs::write(&output, bundle)?;

    info!(output_file = output; "STIX bundle exported successfully");

    Ok(())
}
