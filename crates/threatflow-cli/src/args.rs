//! Command-line argument definitions for the Threatflow CLI.
//!
//! This module defines the [`Args`] structure parsed from the command line
//! using [`clap`]. Arguments control input/output paths, configuration file
//! selection, and logging verbosity.

use clap::Parser;

/// Command-line arguments for the Threatflow publisher
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input diagram file
    #[arg(help = "Path to the input diagram file")]
    pub input: String,

    /// Path to the output STIX bundle (default: input with `.stix.json`)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Path to configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// The output path, derived from the input when not given.
    pub fn output_path(&self) -> String {
        if let Some(output) = &self.output {
            return output.clone();
        }
        match self.input.strip_suffix(".json") {
            Some(stem) => format!("{stem}.stix.json"),
            None => format!("{}.stix.json", self.input),
        }
    }
}
