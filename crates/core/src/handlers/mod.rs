//! Handlers for every job type.

mod ingest;
mod material;
mod transcribe;

pub use ingest::IngestDocumentsHandler;
pub use material::{BuildMaterialHandler, PublishMaterialHandler};
pub use transcribe::TranscribeMediaHandler;

use std::path::PathBuf;
use std::sync::Arc;

use crate::document::DocumentProcessor;
use crate::jobs::{DuplicateHandler, HandlerRegistry};
use crate::provider::Provider;
use crate::study::SqliteStudyStore;
use crate::transcription::TranscriptionService;

/// Settings shared by the handlers.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Study language used when a payload does not name one.
    pub language: String,
    /// Model for study material generation, optionally provider-prefixed.
    pub material_model: String,
    /// USD ceiling per job. `None` disables the check.
    pub max_cost_per_job: Option<f64>,
    /// Root for durable artifacts such as page images.
    pub data_dir: PathBuf,
}

/// Everything the handlers need, built once at startup.
#[derive(Clone)]
pub struct HandlerDeps {
    pub study: SqliteStudyStore,
    pub provider: Arc<dyn Provider>,
    pub transcription: Arc<TranscriptionService>,
    pub documents: Arc<DocumentProcessor>,
    pub settings: Arc<HandlerSettings>,
}

/// Registry with one handler per job type.
pub fn build_registry(deps: &HandlerDeps) -> Result<HandlerRegistry, DuplicateHandler> {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(TranscribeMediaHandler::new(
        deps.study.clone(),
        Arc::clone(&deps.transcription),
        Arc::clone(&deps.settings),
    )))?;
    registry.register(Arc::new(IngestDocumentsHandler::new(
        deps.study.clone(),
        Arc::clone(&deps.documents),
        Arc::clone(&deps.settings),
    )))?;
    registry.register(Arc::new(BuildMaterialHandler::new(
        deps.study.clone(),
        Arc::clone(&deps.provider),
        Arc::clone(&deps.settings),
    )))?;
    registry.register(Arc::new(PublishMaterialHandler::new(deps.study.clone())))?;
    Ok(registry)
}
