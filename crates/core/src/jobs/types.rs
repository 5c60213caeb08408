//! Job data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::provider::ChatUsage;
use crate::study::MaterialKind;

/// Kind of work a job performs. Each kind has exactly one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    TranscribeMedia,
    IngestDocuments,
    BuildMaterial,
    PublishMaterial,
}

impl JobType {
    pub const ALL: [JobType; 4] = [
        JobType::TranscribeMedia,
        JobType::IngestDocuments,
        JobType::BuildMaterial,
        JobType::PublishMaterial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::TranscribeMedia => "transcribe_media",
            JobType::IngestDocuments => "ingest_documents",
            JobType::BuildMaterial => "build_material",
            JobType::PublishMaterial => "publish_material",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state. Transitions only move forward:
/// pending -> running -> {completed, failed, cancelled}, or pending -> cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulated token and cost figures of one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// USD. Zero when no backend reported a cost.
    pub cost: f64,
}

impl JobUsage {
    pub fn add(&mut self, usage: &ChatUsage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
        self.cost += usage.cost.unwrap_or(0.0);
    }
}

/// A persisted unit of background work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// 0-100, non-decreasing while running.
    pub progress: u8,
    pub progress_message: String,
    /// Handler input, decoded into [`JobPayload`] after dispatch.
    pub payload: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub usage: JobUsage,
    pub cancel_requested: bool,
    /// Job this one retries, if any.
    pub retry_of: Option<String>,
    /// 1 for an original job, incremented per retry.
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Request to enqueue a job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: String,
    pub job_type: JobType,
    pub payload: Value,
}

impl NewJob {
    pub fn new(user_id: impl Into<String>, job_type: JobType, payload: Value) -> Self {
        Self {
            user_id: user_id.into(),
            job_type,
            payload,
        }
    }

    pub fn from_payload(user_id: impl Into<String>, payload: &JobPayload) -> Self {
        Self::new(user_id, payload.job_type(), payload.to_value())
    }
}

/// Terminal result of running a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed { result: Option<Value> },
    Failed { error: String },
    Cancelled { reason: String },
}

impl JobOutcome {
    pub fn status(&self) -> JobStatus {
        match self {
            JobOutcome::Completed { .. } => JobStatus::Completed,
            JobOutcome::Failed { .. } => JobStatus::Failed,
            JobOutcome::Cancelled { .. } => JobStatus::Cancelled,
        }
    }
}

/// Filter for querying jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    pub user_id: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            job_type: None,
            user_id: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_job_type(mut self, job_type: JobType) -> Self {
        self.job_type = Some(job_type);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeMediaPayload {
    pub lecture_id: String,
    /// Overrides the configured study language.
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestDocumentsPayload {
    pub lecture_id: String,
    /// Documents to process. Empty means every document of the lecture.
    #[serde(default)]
    pub document_ids: Vec<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMaterialPayload {
    pub lecture_id: String,
    pub kind: MaterialKind,
    #[serde(default)]
    pub language: Option<String>,
    /// Overrides the configured material model.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishMaterialPayload {
    pub material_id: String,
}

/// Typed handler input, one variant per job type.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPayload {
    TranscribeMedia(TranscribeMediaPayload),
    IngestDocuments(IngestDocumentsPayload),
    BuildMaterial(BuildMaterialPayload),
    PublishMaterial(PublishMaterialPayload),
}

impl JobPayload {
    /// Decodes `value` as the payload of `job_type`.
    pub fn decode(job_type: JobType, value: &Value) -> Result<Self, serde_json::Error> {
        Ok(match job_type {
            JobType::TranscribeMedia => {
                JobPayload::TranscribeMedia(serde_json::from_value(value.clone())?)
            }
            JobType::IngestDocuments => {
                JobPayload::IngestDocuments(serde_json::from_value(value.clone())?)
            }
            JobType::BuildMaterial => {
                JobPayload::BuildMaterial(serde_json::from_value(value.clone())?)
            }
            JobType::PublishMaterial => {
                JobPayload::PublishMaterial(serde_json::from_value(value.clone())?)
            }
        })
    }

    pub fn job_type(&self) -> JobType {
        match self {
            JobPayload::TranscribeMedia(_) => JobType::TranscribeMedia,
            JobPayload::IngestDocuments(_) => JobType::IngestDocuments,
            JobPayload::BuildMaterial(_) => JobType::BuildMaterial,
            JobPayload::PublishMaterial(_) => JobType::PublishMaterial,
        }
    }

    pub fn to_value(&self) -> Value {
        let value = match self {
            JobPayload::TranscribeMedia(p) => serde_json::to_value(p),
            JobPayload::IngestDocuments(p) => serde_json::to_value(p),
            JobPayload::BuildMaterial(p) => serde_json::to_value(p),
            JobPayload::PublishMaterial(p) => serde_json::to_value(p),
        };
        // Plain structs of strings always serialize.
        value.unwrap_or(Value::Null)
    }
}

/// A job currently held by a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveJob {
    pub job_id: String,
    pub job_type: JobType,
    pub worker_id: usize,
    pub started_at: DateTime<Utc>,
}

/// Current state of the worker pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    pub workers: usize,
    pub active_jobs: Vec<ActiveJob>,
    pub pending: i64,
    /// Jobs finalized by this process since start, any outcome.
    pub processed: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
}
