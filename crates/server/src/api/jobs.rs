//! Job API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use lectern_core::jobs::JobUsage;
use lectern_core::{Job, JobFilter, JobPayload, JobStatus, JobStoreError, JobType, NewJob};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{api_error, ApiError};
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for enqueueing a job
#[derive(Debug, Deserialize)]
pub struct CreateJobBody {
    /// One of `transcribe_media`, `ingest_documents`, `build_material`, `publish_material`
    pub job_type: String,
    /// Owner; defaults to "anonymous"
    pub user_id: Option<String>,
    /// Handler input, validated against the job type
    pub payload: Value,
}

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    pub status: Option<String>,
    pub job_type: Option<String>,
    pub user_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for job operations
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub user_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub progress: u8,
    pub progress_message: String,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub usage: JobUsage,
    pub cancel_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_of: Option<String>,
    pub attempt: u32,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            user_id: job.user_id,
            job_type: job.job_type,
            status: job.status,
            progress: job.progress,
            progress_message: job.progress_message,
            payload: job.payload,
            result: job.result,
            error: job.error,
            usage: job.usage,
            cancel_requested: job.cancel_requested,
            retry_of: job.retry_of,
            attempt: job.attempt,
            created_at: job.created_at.to_rfc3339(),
            started_at: job.started_at.map(|t| t.to_rfc3339()),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobResponse>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Map store errors onto HTTP statuses.
fn store_error(e: JobStoreError) -> ApiError {
    match e {
        JobStoreError::NotFound(id) => {
            api_error(StatusCode::NOT_FOUND, format!("Job not found: {}", id))
        }
        e @ (JobStoreError::InvalidState { .. } | JobStoreError::RetryLimit { .. }) => {
            api_error(StatusCode::CONFLICT, e.to_string())
        }
        e => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn parse_job_type(value: &str) -> Result<JobType, ApiError> {
    JobType::parse(value).ok_or_else(|| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Unknown job type: {}", value),
        )
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Enqueue a job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let job_type = parse_job_type(&body.job_type)?;

    // Reject bad input here instead of failing the job later.
    let payload = JobPayload::decode(job_type, &body.payload).map_err(|e| {
        api_error(
            StatusCode::BAD_REQUEST,
            format!("Invalid payload for {}: {}", job_type, e),
        )
    })?;

    let user_id = body.user_id.unwrap_or_else(|| "anonymous".to_string());
    let job = state
        .engine()
        .enqueue(NewJob::from_payload(user_id, &payload))
        .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

/// Get a job by ID
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    match state.engine().store().get(&id) {
        Ok(Some(job)) => Ok(Json(JobResponse::from(job))),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Job not found: {}", id),
        )),
        Err(e) => Err(store_error(e)),
    }
}

/// List jobs with optional filters
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = JobFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        let status = JobStatus::parse(status).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("Unknown status: {}", status))
        })?;
        filter = filter.with_status(status);
    }

    if let Some(ref job_type) = params.job_type {
        filter = filter.with_job_type(parse_job_type(job_type)?);
    }

    if let Some(ref user_id) = params.user_id {
        filter = filter.with_user(user_id);
    }

    let store = state.engine().store();
    let jobs = store.list(&filter).map_err(store_error)?;

    // count ignores limit and offset
    let total = store.count(&filter).map_err(store_error)?;

    Ok(Json(ListJobsResponse {
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// Cancel a pending job, or ask a running one to stop
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.engine().cancel(&id).await.map_err(store_error)?;
    Ok(Json(JobResponse::from(job)))
}

/// Enqueue a new attempt of a failed or cancelled job
pub async fn retry_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<JobResponse>), ApiError> {
    let job = state
        .engine()
        .retry(&id, state.max_retries())
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}
