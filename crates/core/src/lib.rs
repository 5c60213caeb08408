pub mod cancel;
pub mod config;
pub mod db;
pub mod deps;
pub mod document;
pub mod handlers;
pub mod jobs;
pub mod media;
pub mod process;
pub mod progress;
pub mod provider;
pub mod study;
pub mod testing;
pub mod transcription;
pub mod usage;

pub use cancel::{CancelReason, CancelToken};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    TranscriptionBackend,
};
pub use db::{Database, DbError};
pub use deps::{check_dependencies, DependencyReport, MissingDependencies};
pub use handlers::{build_registry, HandlerDeps, HandlerSettings};
pub use jobs::{
    EngineConfig, EngineStatus, HandlerRegistry, Job, JobEngine, JobFilter, JobPayload,
    JobStatus, JobStore, JobStoreError, JobType, NewJob, SqliteJobStore,
};
pub use progress::{NoopProgress, ProgressReporter};
pub use provider::{ChatRequest, Credentials, Provider, ProviderError, RoutingProvider};
pub use study::SqliteStudyStore;
pub use usage::{CostLimitExceeded, UsageRecorder, UsageTally};
