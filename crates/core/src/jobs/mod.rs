//! Background job engine.
//!
//! Jobs are rows in the `jobs` table. A fixed pool of workers claims them
//! oldest first, dispatches each to the handler registered for its type, and
//! records a terminal status once the handler returns.

mod config;
mod context;
mod engine;
mod handler;
mod scratch;
mod sqlite_store;
mod store;
mod types;

pub use config::EngineConfig;
pub use context::{JobContext, UsageMeter};
pub use engine::JobEngine;
pub use handler::{DuplicateHandler, HandlerError, HandlerRegistry, JobHandler};
pub use scratch::ScratchDir;
pub use sqlite_store::SqliteJobStore;
pub use store::{JobStore, JobStoreError};
pub use types::{
    ActiveJob, BuildMaterialPayload, EngineStatus, IngestDocumentsPayload, Job, JobFilter,
    JobOutcome, JobPayload, JobStatus, JobType, JobUsage, NewJob, PublishMaterialPayload,
    TranscribeMediaPayload,
};
