//! Job engine: a fixed pool of workers draining the persisted queue.
//!
//! Each worker claims the oldest pending job, runs its handler inside a
//! dedicated task (so a panic cannot take the worker down), and writes the
//! terminal status. A per-job watcher turns external cancel requests and the
//! optional deadline into the job's cancel token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::EngineConfig;
use super::context::JobContext;
use super::handler::{HandlerError, HandlerRegistry};
use super::scratch::ScratchDir;
use super::store::{JobStore, JobStoreError};
use super::types::{
    ActiveJob, EngineStatus, Job, JobFilter, JobOutcome, JobPayload, JobStatus, JobUsage, NewJob,
};
use crate::cancel::{CancelReason, CancelToken};

/// How long `stop` waits for workers once their handler tasks are aborted.
const ABORT_WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ActiveEntry {
    info: ActiveJob,
    cancel: CancelToken,
    /// Set once the handler task is spawned.
    task: Option<AbortHandle>,
}

#[derive(Default)]
struct EngineStats {
    processed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

/// Persisted job queue plus worker pool.
pub struct JobEngine {
    config: EngineConfig,
    store: Arc<dyn JobStore>,
    handlers: Arc<HandlerRegistry>,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    wake: Arc<Notify>,
    active: Arc<RwLock<HashMap<String, ActiveEntry>>>,
    stats: Arc<EngineStats>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn JobStore>, handlers: HandlerRegistry) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            store,
            handlers: Arc::new(handlers),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            wake: Arc::new(Notify::new()),
            active: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(EngineStats::default()),
            workers: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the worker pool.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Job engine already running");
            return;
        }

        info!(
            workers = self.config.workers,
            handlers = ?self.handlers.job_types(),
            "Starting job engine"
        );

        if self.config.recover_stale_on_start {
            self.recover_interrupted_jobs();
        }

        let mut handles = self.workers.lock().await;
        for id in 0..self.config.workers {
            let worker = self.worker(id);
            let shutdown_rx = self.shutdown_tx.subscribe();
            handles.push(tokio::spawn(worker.run(shutdown_rx)));
        }

        info!("Job engine started");
    }

    /// Stop claiming jobs and wait for running ones.
    ///
    /// Jobs still running after the grace period are cancelled and recorded
    /// as failed. Handlers that ignore cancellation for a second grace period
    /// are aborted, and their workers record the failure once the handler
    /// future is gone, so scratch directories never vanish under a live handler.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Job engine not running");
            return;
        }

        info!("Stopping job engine");

        let _ = self.shutdown_tx.send(());
        let mut handles = std::mem::take(&mut *self.workers.lock().await);
        let grace = self.config.shutdown_grace();

        if tokio::time::timeout(grace, join_all(handles.iter_mut()))
            .await
            .is_err()
        {
            let active = self.active.read().await;
            warn!(
                jobs = active.len(),
                grace_secs = grace.as_secs(),
                "Jobs still running after grace period, cancelling"
            );
            for entry in active.values() {
                entry.cancel.cancel_with(CancelReason::Shutdown);
            }
            drop(active);

            // A finished handle must not be polled again.
            handles.retain(|h| !h.is_finished());
            if tokio::time::timeout(grace, join_all(handles.iter_mut()))
                .await
                .is_err()
            {
                error!("Handlers ignored cancellation, aborting them");
                for entry in self.active.read().await.values() {
                    if let Some(ref task) = entry.task {
                        task.abort();
                    }
                }

                handles.retain(|h| !h.is_finished());
                if tokio::time::timeout(ABORT_WAIT, join_all(handles.iter_mut()))
                    .await
                    .is_err()
                {
                    // Their jobs stay running until the next start recovers them.
                    error!("Workers did not stop after aborting handlers, aborting workers");
                    for handle in &handles {
                        handle.abort();
                    }
                }
            }
        }

        info!("Job engine stopped");
    }

    /// Persist a new pending job and wake an idle worker.
    pub fn enqueue(&self, job: NewJob) -> Result<Job, JobStoreError> {
        let job = self.store.enqueue(job)?;
        info!(job_id = %job.id, job_type = %job.job_type, user_id = %job.user_id, "Job enqueued");
        self.wake.notify_one();
        Ok(job)
    }

    /// Cancel a pending job, or signal a running one.
    pub async fn cancel(&self, id: &str) -> Result<Job, JobStoreError> {
        let job = self.store.request_cancel(id)?;
        match job.status {
            JobStatus::Cancelled => info!(job_id = %id, "Pending job cancelled"),
            JobStatus::Running => {
                if let Some(entry) = self.active.read().await.get(id) {
                    entry.cancel.cancel_with(CancelReason::Requested);
                }
                info!(job_id = %id, "Cancellation requested for running job");
            }
            _ => {}
        }
        Ok(job)
    }

    /// Enqueue a new attempt of a failed or cancelled job.
    pub fn retry(&self, id: &str, max_retries: u32) -> Result<Job, JobStoreError> {
        let job = self.store.create_retry(id, max_retries)?;
        info!(job_id = %job.id, retry_of = %id, attempt = job.attempt, "Job retry enqueued");
        self.wake.notify_one();
        Ok(job)
    }

    pub async fn status(&self) -> EngineStatus {
        let mut active_jobs: Vec<ActiveJob> = self
            .active
            .read()
            .await
            .values()
            .map(|entry| entry.info.clone())
            .collect();
        active_jobs.sort_by_key(|job| job.worker_id);

        let pending = self
            .store
            .count(&JobFilter::new().with_status(JobStatus::Pending))
            .unwrap_or(0);

        EngineStatus {
            running: self.is_running(),
            workers: self.config.workers,
            active_jobs,
            pending,
            processed: self.stats.processed.load(Ordering::Relaxed),
            completed: self.stats.completed.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            cancelled: self.stats.cancelled.load(Ordering::Relaxed),
        }
    }

    fn recover_interrupted_jobs(&self) {
        match self.store.fail_interrupted() {
            Ok(ids) if ids.is_empty() => debug!("No interrupted jobs to recover"),
            Ok(ids) => {
                for id in &ids {
                    warn!(job_id = %id, "Job interrupted by restart marked failed");
                }
                info!(count = ids.len(), "Recovered interrupted jobs");
            }
            Err(e) => error!(error = %e, "Failed to recover interrupted jobs"),
        }
    }

    fn worker(&self, id: usize) -> Worker {
        Worker {
            id,
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            handlers: Arc::clone(&self.handlers),
            running: Arc::clone(&self.running),
            wake: Arc::clone(&self.wake),
            active: Arc::clone(&self.active),
            stats: Arc::clone(&self.stats),
        }
    }
}

/// State one worker loop owns.
struct Worker {
    id: usize,
    config: EngineConfig,
    store: Arc<dyn JobStore>,
    handlers: Arc<HandlerRegistry>,
    running: Arc<AtomicBool>,
    wake: Arc<Notify>,
    active: Arc<RwLock<HashMap<String, ActiveEntry>>>,
    stats: Arc<EngineStats>,
}

impl Worker {
    async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(worker_id = self.id, "Worker loop started");

        loop {
            while self.running.load(Ordering::SeqCst) {
                match self.store.claim_next_pending() {
                    Ok(Some(job)) => self.run_job(job).await,
                    Ok(None) => break,
                    Err(e) => {
                        error!(worker_id = self.id, error = %e, "Failed to claim job");
                        break;
                    }
                }
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = self.wake.notified() => {}
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        info!(worker_id = self.id, "Worker loop stopped");
    }

    async fn run_job(&self, job: Job) {
        let job_id = job.id.clone();
        let job_type = job.job_type;
        info!(
            job_id = %job_id,
            job_type = %job_type,
            worker_id = self.id,
            attempt = job.attempt,
            "Job claimed"
        );

        let cancel = CancelToken::new();
        self.active.write().await.insert(
            job_id.clone(),
            ActiveEntry {
                info: ActiveJob {
                    job_id: job_id.clone(),
                    job_type,
                    worker_id: self.id,
                    started_at: job.started_at.unwrap_or_else(Utc::now),
                },
                cancel: cancel.clone(),
                task: None,
            },
        );

        let (outcome, usage) = self.execute(job, &cancel).await;
        self.finish(&job_id, outcome, &usage);

        self.active.write().await.remove(&job_id);
    }

    async fn execute(&self, job: Job, cancel: &CancelToken) -> (JobOutcome, JobUsage) {
        let Some(handler) = self.handlers.get(job.job_type) else {
            return failed(format!("unknown job type: {}", job.job_type));
        };

        let payload = match JobPayload::decode(job.job_type, &job.payload) {
            Ok(payload) => payload,
            Err(e) => return failed(format!("invalid payload: {}", e)),
        };

        let scratch = match ScratchDir::create(&self.config.scratch_dir, &job.id) {
            Ok(scratch) => scratch,
            Err(e) => return failed(format!("failed to create scratch directory: {}", e)),
        };

        let job_id = job.id.clone();
        let ctx = Arc::new(JobContext::new(
            job,
            cancel.clone(),
            Arc::clone(&self.store),
            scratch.path(),
        ));

        let watcher = tokio::spawn(watch_cancellation(
            job_id.clone(),
            cancel.clone(),
            Arc::clone(&self.store),
            self.config.poll_interval(),
            self.config.job_timeout(),
        ));

        let task = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { handler.handle(&ctx, payload).await }
        });
        if let Some(entry) = self.active.write().await.get_mut(&job_id) {
            entry.task = Some(task.abort_handle());
        }
        // An aborted handler resolves only after its future is dropped, so the
        // scratch directory below outlives every use of it.
        let joined = task.await;
        watcher.abort();

        let usage = ctx.usage();
        drop(ctx);
        if let Err(e) = scratch.close() {
            warn!(job_id = %job_id, error = %e, "Failed to remove scratch directory");
        }

        (outcome_of(joined, cancel), usage)
    }

    fn finish(&self, job_id: &str, outcome: JobOutcome, usage: &JobUsage) {
        match self.store.finalize(job_id, outcome, usage) {
            Ok(job) => {
                self.stats.processed.fetch_add(1, Ordering::Relaxed);
                match job.status {
                    JobStatus::Completed => {
                        self.stats.completed.fetch_add(1, Ordering::Relaxed);
                        info!(
                            job_id = %job_id,
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            cost = usage.cost,
                            "Job completed"
                        );
                    }
                    JobStatus::Cancelled => {
                        self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                        info!(job_id = %job_id, reason = ?job.error, "Job cancelled");
                    }
                    _ => {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(job_id = %job_id, error = ?job.error, "Job failed");
                    }
                }
            }
            Err(e) => error!(job_id = %job_id, error = %e, "Failed to finalize job"),
        }
    }
}

fn failed(error: String) -> (JobOutcome, JobUsage) {
    (JobOutcome::Failed { error }, JobUsage::default())
}

/// Map the handler task's result onto a terminal outcome.
fn outcome_of(
    joined: Result<Result<Option<Value>, HandlerError>, JoinError>,
    cancel: &CancelToken,
) -> JobOutcome {
    match joined {
        Ok(Ok(result)) => JobOutcome::Completed { result },
        Ok(Err(e)) if e.is_cancellation() || cancel.is_cancelled() => match cancel.reason() {
            Some(CancelReason::Shutdown) => JobOutcome::Failed {
                error: "interrupted by engine shutdown".to_string(),
            },
            Some(reason) => JobOutcome::Cancelled {
                reason: reason.to_string(),
            },
            None => JobOutcome::Cancelled {
                reason: e.to_string(),
            },
        },
        Ok(Err(e)) => JobOutcome::Failed {
            error: e.to_string(),
        },
        Err(e) if e.is_panic() => JobOutcome::Failed {
            error: format!("handler panicked: {}", panic_message(e)),
        },
        Err(_) if cancel.reason() == Some(CancelReason::Shutdown) => JobOutcome::Failed {
            error: "interrupted by engine shutdown".to_string(),
        },
        Err(e) => JobOutcome::Failed {
            error: format!("handler task aborted: {}", e),
        },
    }
}

fn panic_message(e: JoinError) -> String {
    let payload = e.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Turns an external cancel request or the job deadline into `cancel`.
async fn watch_cancellation(
    job_id: String,
    cancel: CancelToken,
    store: Arc<dyn JobStore>,
    poll: Duration,
    timeout: Option<Duration>,
) {
    let deadline = timeout.map(|t| (Instant::now() + t, t));
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = sleep_until_deadline(deadline) => {
                if let Some((_, limit)) = deadline {
                    warn!(job_id = %job_id, limit_secs = limit.as_secs(), "Job deadline reached, cancelling");
                    cancel.cancel_with(CancelReason::Timeout(limit));
                }
                return;
            }
            _ = ticker.tick() => match store.is_cancel_requested(&job_id) {
                Ok(true) => {
                    info!(job_id = %job_id, "Cancel flag observed");
                    cancel.cancel_with(CancelReason::Requested);
                    return;
                }
                Ok(false) => {}
                Err(e) => debug!(job_id = %job_id, error = %e, "Cancel flag check failed"),
            },
        }
    }
}

async fn sleep_until_deadline(deadline: Option<(Instant, Duration)>) {
    match deadline {
        Some((at, _)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
