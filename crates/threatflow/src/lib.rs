//! Threatflow - threat-model diagrams published as STIX 2.1 Attack Flows.
//!
//! Loading, semantic analysis, and publishing for Threatflow diagram files.
//! The diagram model itself lives in `threatflow-core` and is re-exported here.

pub mod config;
pub mod publish;
pub mod semantic;

mod error;

pub use threatflow_core::{diagram, factory, file, identifier, property, template};

pub use error::{FlowError, PublishError};

use std::fs;

use chrono::{DateTime, Utc};
use log::{debug, info, trace};

use threatflow_core::{
    ModelError,
    diagram::{Diagram, ObjectKey},
    factory::DiagramFactory,
    file::DiagramFile,
    template::TemplateCatalog,
};

use config::AppConfig;
use publish::{Publisher, StixBundle};

/// A loaded diagram and its canvas.
#[derive(Debug)]
pub struct Document {
    diagram: Diagram,
    canvas: ObjectKey,
}

impl Document {
    pub fn new(diagram: Diagram, canvas: ObjectKey) -> Self {
        Self { diagram, canvas }
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn diagram_mut(&mut self) -> &mut Diagram {
        &mut self.diagram
    }

    pub fn canvas(&self) -> ObjectKey {
        self.canvas
    }

    /// Serializes the document in the diagram file format.
    ///
    /// # Errors
    ///
    /// Returns `FlowError` if the canvas is no longer in the diagram.
    pub fn to_json(&self, pretty: bool) -> Result<String, FlowError> {
        let file = DiagramFile::export(&self.diagram, self.canvas)?;
        Ok(file.to_json(pretty)?)
    }
}

/// Loads diagram files and publishes them as STIX bundles.
///
/// # Examples
///
/// ```rust,no_run
/// use threatflow::{FlowPublisher, config::AppConfig};
///
/// let publisher = FlowPublisher::new(AppConfig::default())
///     .expect("Failed to load catalog");
///
/// let source = std::fs::read_to_string("flow.json").expect("Failed to read");
/// let document = publisher.load(&source).expect("Failed to load");
/// let bundle = publisher.publish(&document).expect("Failed to publish");
/// println!("{bundle}");
/// ```
#[derive(Debug)]
pub struct FlowPublisher {
    config: AppConfig,
    catalog: TemplateCatalog,
    clock: Option<DateTime<Utc>>,
}

impl FlowPublisher {
    /// Creates a publisher, loading the template catalog the configuration
    /// selects.
    ///
    /// # Errors
    ///
    /// Returns `FlowError` if a custom catalog cannot be read or parsed, or
    /// if the configured time zone is invalid.
    pub fn new(config: AppConfig) -> Result<Self, FlowError> {
        config
            .publish()
            .default_timezone()
            .map_err(FlowError::Config)?;

        let catalog = match config.catalog().path() {
            Some(path) => {
                info!(path:? = path; "Loading template catalog");
                let text = fs::read_to_string(path)?;
                TemplateCatalog::from_json(&text).map_err(|err| json_error(err, &text))?
            }
            None => TemplateCatalog::attack_flow()?,
        };

        Ok(Self {
            config,
            catalog,
            clock: None,
        })
    }

    /// Stamps published records with `now` instead of the current time.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    /// An object factory using the configured default time zone.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Config` if the configured time zone is invalid.
    pub fn factory(&self) -> Result<DiagramFactory<'_>, FlowError> {
        let zone = self
            .config
            .publish()
            .default_timezone()
            .map_err(FlowError::Config)?;
        Ok(DiagramFactory::new(&self.catalog).with_zone(zone))
    }

    /// Creates an empty document with a fresh canvas.
    ///
    /// # Errors
    ///
    /// Returns `FlowError` if the catalog has no usable canvas template.
    pub fn create(&self) -> Result<Document, FlowError> {
        let mut diagram = Diagram::new();
        let canvas = self.factory()?.create_canvas(&mut diagram)?;
        Ok(Document::new(diagram, canvas))
    }

    /// Parses a diagram file.
    ///
    /// # Errors
    ///
    /// Returns `FlowError::Json` with the source text for malformed JSON, and
    /// `FlowError::Model` if the objects do not form a valid diagram.
    pub fn load(&self, source: &str) -> Result<Document, FlowError> {
        info!("Loading diagram");

        let file = DiagramFile::from_json(source).map_err(|err| json_error(err, source))?;
        let (diagram, canvas) = file.import(&self.factory()?)?;

        debug!(objects = diagram.len(); "Diagram loaded");
        trace!(diagram:?; "Loaded diagram");
        Ok(Document::new(diagram, canvas))
    }

    /// Publishes a document as a STIX bundle.
    ///
    /// # Errors
    ///
    /// Returns `FlowError` if the semantic graph cannot be built or the
    /// publisher rejects it.
    pub fn publish_bundle(&self, document: &Document) -> Result<StixBundle, FlowError> {
        info!("Building semantic graph");
        let graph = semantic::build(document.diagram(), document.canvas())?;

        let mut publisher = Publisher::new(&self.catalog, self.config.publish());
        if let Some(now) = self.clock {
            publisher = publisher.with_clock(now);
        }
        Ok(publisher.publish(&graph)?)
    }

    /// Publishes a document and serializes the bundle.
    ///
    /// Output is pretty-printed unless the configuration disables it.
    ///
    /// # Errors
    ///
    /// See [`FlowPublisher::publish_bundle`].
    pub fn publish(&self, document: &Document) -> Result<String, FlowError> {
        let bundle = self.publish_bundle(document)?;
        Ok(bundle.to_json(self.config.publish().pretty())?)
    }
}

/// Keeps the source text with JSON syntax errors for diagnostics.
fn json_error(err: ModelError, source: &str) -> FlowError {
    match err {
        ModelError::Json(err) => FlowError::new_json_error(err, source),
        other => FlowError::Model(other),
    }
}
