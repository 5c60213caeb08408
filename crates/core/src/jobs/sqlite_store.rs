//! SQLite-backed job store implementation.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::warn;

use super::store::{JobStore, JobStoreError};
use super::types::{Job, JobFilter, JobOutcome, JobStatus, JobType, JobUsage, NewJob};
use crate::db::{format_timestamp, parse_optional_timestamp, parse_timestamp, Database};

const JOB_COLUMNS: &str = "id, user_id, job_type, status, progress, progress_message, payload, \
     result, error, input_tokens, output_tokens, cost, cancel_requested, retry_of, attempt, \
     created_at, started_at, completed_at";

/// SQLite-backed job store.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(job_type) = filter.job_type {
            conditions.push("job_type = ?");
            params.push(Box::new(job_type.as_str()));
        }

        if let Some(ref user_id) = filter.user_id {
            conditions.push("user_id = ?");
            params.push(Box::new(user_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let job_type_str: String = row.get(2)?;
        let status_str: String = row.get(3)?;
        let payload_json: String = row.get(6)?;
        let result_json: Option<String> = row.get(7)?;
        let created_at_str: String = row.get(15)?;

        // Unknown types are failed at claim time and filtered from listings.
        let job_type = JobType::parse(&job_type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown job type: {}", job_type_str).into(),
            )
        })?;
        let status = JobStatus::parse(&status_str).unwrap_or(JobStatus::Failed);

        Ok(Job {
            id: row.get(0)?,
            user_id: row.get(1)?,
            job_type,
            status,
            progress: row.get::<_, i64>(4)?.clamp(0, 100) as u8,
            progress_message: row.get(5)?,
            payload: serde_json::from_str(&payload_json).unwrap_or(Value::Null),
            result: result_json.and_then(|json| serde_json::from_str(&json).ok()),
            error: row.get(8)?,
            usage: JobUsage {
                input_tokens: row.get::<_, i64>(9)?.max(0) as u64,
                output_tokens: row.get::<_, i64>(10)?.max(0) as u64,
                cost: row.get(11)?,
            },
            cancel_requested: row.get::<_, i64>(12)? != 0,
            retry_of: row.get(13)?,
            attempt: row.get::<_, i64>(14)?.max(1) as u32,
            created_at: parse_timestamp(&created_at_str),
            started_at: parse_optional_timestamp(row.get(16)?),
            completed_at: parse_optional_timestamp(row.get(17)?),
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Job>, JobStoreError> {
        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    fn fetch_existing(conn: &Connection, id: &str) -> Result<Job, JobStoreError> {
        Self::fetch(conn, id)?.ok_or_else(|| JobStoreError::NotFound(id.to_string()))
    }

    fn invalid_state(job: &Job, operation: &str) -> JobStoreError {
        JobStoreError::InvalidState {
            job_id: job.id.clone(),
            status: job.status.to_string(),
            operation: operation.to_string(),
        }
    }

    fn insert(conn: &Connection, job: &Job) -> Result<(), JobStoreError> {
        conn.execute(
            "INSERT INTO jobs (id, user_id, job_type, status, progress, progress_message, payload, retry_of, attempt, created_at) \
             VALUES (?, ?, ?, ?, 0, '', ?, ?, ?, ?)",
            params![
                job.id,
                job.user_id,
                job.job_type.as_str(),
                job.status.as_str(),
                serde_json::to_string(&job.payload)?,
                job.retry_of,
                job.attempt,
                format_timestamp(job.created_at),
            ],
        )?;
        Ok(())
    }

    fn pending_job(
        user_id: String,
        job_type: JobType,
        payload: Value,
        retry_of: Option<String>,
        attempt: u32,
    ) -> Job {
        Job {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            job_type,
            status: JobStatus::Pending,
            progress: 0,
            progress_message: String::new(),
            payload,
            result: None,
            error: None,
            usage: JobUsage::default(),
            cancel_requested: false,
            retry_of,
            attempt,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

impl JobStore for SqliteJobStore {
    fn enqueue(&self, job: NewJob) -> Result<Job, JobStoreError> {
        let conn = self.db.lock()?;
        let job = Self::pending_job(job.user_id, job.job_type, job.payload, None, 1);
        Self::insert(&conn, &job)?;
        Ok(job)
    }

    fn get(&self, id: &str) -> Result<Option<Job>, JobStoreError> {
        let conn = self.db.lock()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobStoreError> {
        let conn = self.db.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?",
            JOB_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_job)?;

        let mut jobs = Vec::new();
        for row_result in rows {
            match row_result {
                Ok(job) => jobs.push(job),
                Err(rusqlite::Error::FromSqlConversionFailure(_, _, e)) => {
                    warn!(error = %e, "Skipping unreadable job row");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(jobs)
    }

    fn count(&self, filter: &JobFilter) -> Result<i64, JobStoreError> {
        let conn = self.db.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))?;
        Ok(count)
    }

    fn claim_next_pending(&self) -> Result<Option<Job>, JobStoreError> {
        let conn = self.db.lock()?;

        loop {
            let now = format_timestamp(Utc::now());
            let claimed: Option<(String, String)> = conn
                .query_row(
                    "UPDATE jobs SET status = 'running', started_at = ?1, progress = 0 \
                     WHERE id = (SELECT id FROM jobs WHERE status = 'pending' \
                                 ORDER BY created_at ASC, rowid ASC LIMIT 1) \
                       AND status = 'pending' \
                     RETURNING id, job_type",
                    params![now],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((id, job_type)) = claimed else {
                return Ok(None);
            };

            if JobType::parse(&job_type).is_none() {
                warn!(job_id = %id, job_type = %job_type, "Failing job with unknown type");
                conn.execute(
                    "UPDATE jobs SET status = 'failed', error = ?2, completed_at = ?3 WHERE id = ?1",
                    params![id, format!("unknown job type: {}", job_type), now],
                )?;
                continue;
            }

            return Self::fetch(&conn, &id);
        }
    }

    fn update_progress(
        &self,
        id: &str,
        percent: u8,
        message: &str,
    ) -> Result<bool, JobStoreError> {
        let conn = self.db.lock()?;
        let changed = conn.execute(
            "UPDATE jobs SET progress = MAX(progress, ?2), progress_message = ?3 \
             WHERE id = ?1 AND status = 'running'",
            params![id, percent.min(100), message],
        )?;
        Ok(changed > 0)
    }

    fn finalize(
        &self,
        id: &str,
        outcome: JobOutcome,
        usage: &JobUsage,
    ) -> Result<Job, JobStoreError> {
        let conn = self.db.lock()?;

        let status = outcome.status();
        let (result, error, message) = match outcome {
            JobOutcome::Completed { result } => (
                result.map(|r| serde_json::to_string(&r)).transpose()?,
                None,
                Some("Completed"),
            ),
            JobOutcome::Failed { error } => (None, Some(error), None),
            JobOutcome::Cancelled { reason } => (None, Some(reason), Some("Cancelled")),
        };

        let changed = conn.execute(
            "UPDATE jobs SET status = ?2, result = ?3, error = ?4, \
                 progress = CASE WHEN ?2 = 'completed' THEN 100 ELSE progress END, \
                 progress_message = COALESCE(?5, progress_message), \
                 input_tokens = ?6, output_tokens = ?7, cost = ?8, completed_at = ?9 \
             WHERE id = ?1 AND status = 'running'",
            params![
                id,
                status.as_str(),
                result,
                error,
                message,
                usage.input_tokens as i64,
                usage.output_tokens as i64,
                usage.cost,
                format_timestamp(Utc::now()),
            ],
        )?;

        let job = Self::fetch_existing(&conn, id)?;
        if changed == 0 {
            return Err(Self::invalid_state(&job, "finalize"));
        }
        Ok(job)
    }

    fn request_cancel(&self, id: &str) -> Result<Job, JobStoreError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        let current = Self::fetch_existing(&tx, id)?;
        match current.status {
            JobStatus::Pending => {
                tx.execute(
                    "UPDATE jobs SET status = 'cancelled', cancel_requested = 1, \
                         error = 'cancelled before start', progress_message = 'Cancelled', \
                         completed_at = ?2 \
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, format_timestamp(Utc::now())],
                )?;
            }
            JobStatus::Running => {
                tx.execute(
                    "UPDATE jobs SET cancel_requested = 1 WHERE id = ?1 AND status = 'running'",
                    params![id],
                )?;
            }
            _ => return Err(Self::invalid_state(&current, "cancel")),
        }

        let job = Self::fetch_existing(&tx, id)?;
        tx.commit()?;
        Ok(job)
    }

    fn is_cancel_requested(&self, id: &str) -> Result<bool, JobStoreError> {
        let conn = self.db.lock()?;
        let flag: Option<i64> = conn
            .query_row(
                "SELECT cancel_requested FROM jobs WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match flag {
            Some(flag) => Ok(flag != 0),
            None => Err(JobStoreError::NotFound(id.to_string())),
        }
    }

    fn create_retry(&self, id: &str, max_retries: u32) -> Result<Job, JobStoreError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        let original = Self::fetch_existing(&tx, id)?;
        if !matches!(original.status, JobStatus::Failed | JobStatus::Cancelled) {
            return Err(Self::invalid_state(&original, "retry"));
        }

        let already_retried: i64 = tx.query_row(
            "SELECT COUNT(*) FROM jobs WHERE retry_of = ?",
            params![id],
            |row| row.get(0),
        )?;
        if already_retried > 0 {
            return Err(JobStoreError::InvalidState {
                job_id: id.to_string(),
                status: "already retried".to_string(),
                operation: "retry".to_string(),
            });
        }

        // attempt 1 is the original run, so max_retries allows max_retries + 1 attempts.
        if original.attempt > max_retries {
            return Err(JobStoreError::RetryLimit {
                job_id: id.to_string(),
                attempts: original.attempt,
                max_retries,
            });
        }

        let job = Self::pending_job(
            original.user_id,
            original.job_type,
            original.payload,
            Some(original.id),
            original.attempt + 1,
        );
        Self::insert(&tx, &job)?;
        tx.commit()?;
        Ok(job)
    }

    fn fail_interrupted(&self) -> Result<Vec<String>, JobStoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "UPDATE jobs SET status = 'failed', error = 'interrupted by process restart', \
                 completed_at = ?1 \
             WHERE status = 'running' \
             RETURNING id",
        )?;
        let ids = stmt
            .query_map(params![format_timestamp(Utc::now())], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }
}
