//! Per-job handle passed to handlers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::handler::HandlerError;
use super::store::JobStore;
use super::types::{Job, JobUsage};
use crate::cancel::CancelToken;
use crate::progress::ProgressReporter;
use crate::provider::ChatUsage;
use crate::usage::{CostLimitExceeded, UsageRecorder};

/// What a running handler may see and touch of its job.
pub struct JobContext {
    job: Job,
    cancel: CancelToken,
    store: Arc<dyn JobStore>,
    scratch: PathBuf,
    usage: Mutex<JobUsage>,
}

impl JobContext {
    pub fn new(
        job: Job,
        cancel: CancelToken,
        store: Arc<dyn JobStore>,
        scratch: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job,
            cancel,
            store,
            scratch: scratch.into(),
            usage: Mutex::new(JobUsage::default()),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Private working directory, removed after the job ends.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn ensure_not_cancelled(&self) -> Result<(), HandlerError> {
        if self.cancel.is_cancelled() {
            Err(HandlerError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Persist a progress update. Store failures are logged, not fatal.
    pub fn update_progress(&self, percent: u8, message: &str) {
        match self.store.update_progress(&self.job.id, percent, message) {
            Ok(true) => debug!(job_id = %self.job.id, percent, message, "Progress"),
            Ok(false) => debug!(job_id = %self.job.id, "Progress ignored, job no longer running"),
            Err(e) => warn!(job_id = %self.job.id, error = %e, "Failed to persist progress"),
        }
    }

    /// Add provider usage to the job's totals.
    ///
    /// Fails once the accumulated cost passes `limit`, letting the handler
    /// stop before spending more.
    pub fn record_usage(&self, usage: &ChatUsage, limit: Option<f64>) -> Result<(), HandlerError> {
        self.add_usage(usage, limit).map_err(HandlerError::from)
    }

    /// A recorder for pipelines that bill per call, enforcing `limit` after each one.
    pub fn usage_meter(&self, limit: Option<f64>) -> UsageMeter<'_> {
        UsageMeter { ctx: self, limit }
    }

    fn add_usage(&self, usage: &ChatUsage, limit: Option<f64>) -> Result<(), CostLimitExceeded> {
        let mut total = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        total.add(usage);
        match limit {
            Some(limit) if total.cost > limit => Err(CostLimitExceeded {
                spent: total.cost,
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub fn usage(&self) -> JobUsage {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Records into a job's totals under its cost ceiling.
pub struct UsageMeter<'a> {
    ctx: &'a JobContext,
    limit: Option<f64>,
}

impl UsageRecorder for UsageMeter<'_> {
    fn record(&self, usage: &ChatUsage) -> Result<(), CostLimitExceeded> {
        self.ctx.add_usage(usage, self.limit)
    }
}

impl ProgressReporter for JobContext {
    fn report(&self, percent: u8, message: &str) {
        self.update_progress(percent, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::jobs::{JobStatus, JobType, NewJob, SqliteJobStore};
    use serde_json::json;

    fn running_context() -> (JobContext, Arc<SqliteJobStore>) {
        let store = Arc::new(SqliteJobStore::new(Database::in_memory().unwrap()));
        store
            .enqueue(NewJob::new(
                "u",
                JobType::PublishMaterial,
                json!({"material_id": "m"}),
            ))
            .unwrap();
        let job = store.claim_next_pending().unwrap().unwrap();
        let ctx = JobContext::new(job, CancelToken::new(), store.clone(), "/tmp/none");
        (ctx, store)
    }

    #[test]
    fn test_progress_is_persisted() {
        let (ctx, store) = running_context();
        ctx.report(30, "Working");

        let job = store.get(ctx.job_id()).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 30);
        assert_eq!(job.progress_message, "Working");
    }

    #[test]
    fn test_cost_limit() {
        let (ctx, _store) = running_context();
        let call = ChatUsage {
            input_tokens: 100,
            output_tokens: 50,
            cost: Some(0.4),
        };

        assert!(ctx.record_usage(&call, Some(1.0)).is_ok());
        assert!(ctx.record_usage(&call, Some(1.0)).is_ok());
        let err = ctx.record_usage(&call, Some(1.0)).unwrap_err();
        assert!(matches!(err, HandlerError::CostLimit(_)));

        let usage = ctx.usage();
        assert_eq!(usage.input_tokens, 300);
        assert!((usage.cost - 1.2).abs() < 1e-9);

        assert!(ctx.record_usage(&call, None).is_ok());
    }

    #[test]
    fn test_meter_keeps_usage_past_the_limit() {
        let (ctx, _store) = running_context();
        let meter = ctx.usage_meter(Some(0.10));
        let page = ChatUsage {
            input_tokens: 1000,
            output_tokens: 200,
            cost: Some(0.25),
        };

        let err = meter.record(&page).unwrap_err();
        assert!((err.spent - 0.25).abs() < 1e-9);
        assert_eq!(err.limit, 0.10);
        assert_eq!(ctx.usage().input_tokens, 1000);
    }

    #[test]
    fn test_ensure_not_cancelled() {
        let (ctx, _store) = running_context();
        assert!(ctx.ensure_not_cancelled().is_ok());
        ctx.cancel_token().cancel();
        assert!(matches!(
            ctx.ensure_not_cancelled(),
            Err(HandlerError::Cancelled)
        ));
    }
}
