//! TOML configuration lookup for the command line.
//!
//! An explicit `--config` path must exist. Otherwise the first file found
//! among [`candidate_paths`] is used, and defaults apply when none exists.

use std::{
    fs,
    path::{Path, PathBuf},
};

use directories::ProjectDirs;
use log::{debug, info};
use thiserror::Error;

use threatflow::{FlowError, config::AppConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse TOML configuration: {0}")]
    Parse(String),

    #[error("Missing configuration file: {0}")]
    MissingFile(PathBuf),
}

impl From<ConfigError> for FlowError {
    fn from(err: ConfigError) -> Self {
        FlowError::Config(err.to_string())
    }
}

/// Loads the application configuration.
///
/// # Errors
///
/// Returns `FlowError::Config` when the explicit file is missing or any
/// selected file is not valid TOML, and `FlowError::Io` when it cannot be
/// read.
pub fn load_config(explicit_path: Option<impl AsRef<Path>>) -> Result<AppConfig, FlowError> {
    if let Some(path) = explicit_path {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::MissingFile(path.to_path_buf()).into());
        }
        info!(path = path.display().to_string(); "Using configuration given on the command line");
        return read_config(path);
    }

    match candidate_paths().into_iter().find(|path| path.is_file()) {
        Some(path) => {
            info!(path = path.display().to_string(); "Using configuration file");
            read_config(&path)
        }
        None => {
            debug!("No configuration file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Implicit configuration locations, highest priority first.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("threatflow").join("config.toml")];
    match ProjectDirs::from("com", "threatflow", "threatflow") {
        Some(dirs) => paths.push(dirs.config_dir().join("config.toml")),
        None => debug!("No platform configuration directory"),
    }
    paths
}

fn read_config(path: &Path) -> Result<AppConfig, FlowError> {
    let text = fs::read_to_string(path)?;
    let config = toml::from_str(&text).map_err(|err| ConfigError::Parse(err.to_string()))?;
    Ok(config)
}
