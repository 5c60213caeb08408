//! Job storage trait.

use thiserror::Error;

use super::types::{Job, JobFilter, JobOutcome, JobUsage, NewJob};
use crate::db::DbError;

#[derive(Debug, Error)]
pub enum JobStoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Cannot {operation} job {job_id}: current status is {status}")]
    InvalidState {
        job_id: String,
        status: String,
        operation: String,
    },

    #[error("Job {job_id} already used {attempts} attempt(s), retry limit is {max_retries}")]
    RetryLimit {
        job_id: String,
        attempts: u32,
        max_retries: u32,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<DbError> for JobStoreError {
    fn from(e: DbError) -> Self {
        JobStoreError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for JobStoreError {
    fn from(e: rusqlite::Error) -> Self {
        JobStoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for JobStoreError {
    fn from(e: serde_json::Error) -> Self {
        JobStoreError::Serialization(e.to_string())
    }
}

/// Persistent job queue.
///
/// Every mutation is a conditional update on the current status, so a
/// worker's writes and an external cancel request never overwrite each other.
pub trait JobStore: Send + Sync {
    /// Insert a pending job.
    fn enqueue(&self, job: NewJob) -> Result<Job, JobStoreError>;

    fn get(&self, id: &str) -> Result<Option<Job>, JobStoreError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError>;

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError>;

    /// Atomically move the oldest pending job to running.
    ///
    /// Rows with a job type this build does not know are failed and skipped.
    fn claim_next_pending(&self) -> Result<Option<Job>, JobStoreError>;

    /// Persist progress of a running job. Progress never decreases.
    ///
    /// Returns `false` when the job is no longer running.
    fn update_progress(&self, id: &str, percent: u8, message: &str)
        -> Result<bool, JobStoreError>;

    /// Move a running job to its terminal status and store usage.
    fn finalize(
        &self,
        id: &str,
        outcome: JobOutcome,
        usage: &JobUsage,
    ) -> Result<Job, JobStoreError>;

    /// Cancel a pending job outright, or flag a running one for its worker.
    fn request_cancel(&self, id: &str) -> Result<Job, JobStoreError>;

    fn is_cancel_requested(&self, id: &str) -> Result<bool, JobStoreError>;

    /// Create a new pending job repeating a failed or cancelled one.
    fn create_retry(&self, id: &str, max_retries: u32) -> Result<Job, JobStoreError>;

    /// Fail every job left running by a previous process. Returns their ids.
    fn fail_interrupted(&self) -> Result<Vec<String>, JobStoreError>;
}
