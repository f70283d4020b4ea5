//! Configuration types for Threatflow publishing.
//!
//! This module provides configuration structures that control how diagrams
//! are loaded and published. All types implement [`serde::Deserialize`] for
//! flexible loading from external sources.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level application configuration.
//! - [`PublishConfig`] - Controls bundle formatting and relationship records.
//! - [`CatalogConfig`] - Selects the template catalog.
//!
//! # Example
//!
//! ```
//! # use threatflow::config::AppConfig;
//! // Use default configuration
//! let config = AppConfig::default();
//! assert!(config.publish().pretty());
//! assert!(config.publish().default_timezone().is_ok());
//! ```

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

/// Top-level application configuration.
///
/// Groups [`PublishConfig`] and [`CatalogConfig`] into a single configuration
/// root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Publishing configuration section.
    #[serde(default)]
    publish: PublishConfig,

    /// Template catalog configuration section.
    #[serde(default)]
    catalog: CatalogConfig,
}

impl AppConfig {
    /// Creates a new [`AppConfig`] with the specified sections.
    pub fn new(publish: PublishConfig, catalog: CatalogConfig) -> Self {
        Self { publish, catalog }
    }

    /// Returns the publishing configuration.
    pub fn publish(&self) -> &PublishConfig {
        &self.publish
    }

    /// Returns the catalog configuration.
    pub fn catalog(&self) -> &CatalogConfig {
        &self.catalog
    }
}

/// Bundle output options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Pretty-print the bundle JSON.
    pretty: bool,

    /// `relationship_type` of standalone relationship records.
    relationship_type: String,

    /// IANA zone for dates read without one.
    default_timezone: String,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            pretty: true,
            relationship_type: "related-to".to_string(),
            default_timezone: "UTC".to_string(),
        }
    }
}

impl PublishConfig {
    pub fn new(
        pretty: bool,
        relationship_type: impl Into<String>,
        default_timezone: impl Into<String>,
    ) -> Self {
        Self {
            pretty,
            relationship_type: relationship_type.into(),
            default_timezone: default_timezone.into(),
        }
    }

    pub fn pretty(&self) -> bool {
        self.pretty
    }

    pub fn relationship_type(&self) -> &str {
        &self.relationship_type
    }

    /// Returns the parsed default time zone.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured name is not an IANA zone.
    pub fn default_timezone(&self) -> Result<Tz, String> {
        self.default_timezone
            .parse::<Tz>()
            .map_err(|err| format!("Invalid default_timezone in config: {err}"))
    }
}

/// Template catalog selection.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog replacing the built-in Attack Flow catalog.
    #[serde(default)]
    path: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Returns the custom catalog path, or `None` for the built-in catalog.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
