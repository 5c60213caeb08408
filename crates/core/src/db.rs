//! Shared SQLite connection and schema.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One SQLite connection shared by the job store and the study store.
///
/// Every statement runs under the mutex, so multi-statement writes done
/// inside a transaction are never interleaved with another worker's writes.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and bootstrap the schema.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// In-memory database for tests.
    pub fn in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

fn initialize_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            job_type TEXT NOT NULL,
            status TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            progress_message TEXT NOT NULL DEFAULT '',
            payload TEXT NOT NULL,
            result TEXT,
            error TEXT,
            input_tokens INTEGER NOT NULL DEFAULT 0,
            output_tokens INTEGER NOT NULL DEFAULT 0,
            cost REAL NOT NULL DEFAULT 0,
            cancel_requested INTEGER NOT NULL DEFAULT 0,
            retry_of TEXT,
            attempt INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_jobs_user ON jobs(user_id);

        CREATE TABLE IF NOT EXISTS lecture_media (
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL,
            path TEXT NOT NULL,
            kind TEXT NOT NULL,
            sequence_order INTEGER NOT NULL,
            duration_ms INTEGER,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_lecture_media_lecture
            ON lecture_media(lecture_id, sequence_order);

        CREATE TABLE IF NOT EXISTS transcripts (
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL UNIQUE,
            language TEXT NOT NULL,
            status TEXT NOT NULL,
            confidence REAL,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transcript_segments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transcript_id TEXT NOT NULL REFERENCES transcripts(id) ON DELETE CASCADE,
            media_id TEXT NOT NULL,
            seq INTEGER NOT NULL,
            start_ms INTEGER NOT NULL,
            end_ms INTEGER NOT NULL,
            original_start_ms INTEGER NOT NULL,
            original_end_ms INTEGER NOT NULL,
            text TEXT NOT NULL,
            confidence REAL,
            speaker TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_segments_transcript
            ON transcript_segments(transcript_id, start_ms);

        CREATE TABLE IF NOT EXISTS reference_documents (
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL,
            title TEXT NOT NULL,
            path TEXT NOT NULL,
            status TEXT NOT NULL,
            page_count INTEGER,
            error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reference_documents_lecture
            ON reference_documents(lecture_id);

        CREATE TABLE IF NOT EXISTS reference_pages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            document_id TEXT NOT NULL REFERENCES reference_documents(id) ON DELETE CASCADE,
            page_number INTEGER NOT NULL,
            image_path TEXT NOT NULL,
            text TEXT NOT NULL,
            UNIQUE(document_id, page_number)
        );

        CREATE TABLE IF NOT EXISTS study_materials (
            id TEXT PRIMARY KEY,
            lecture_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            language TEXT NOT NULL,
            model TEXT NOT NULL,
            content TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            published_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_study_materials_lecture
            ON study_materials(lecture_id);
        "#,
    )?;
    Ok(())
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().map(parse_timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_schema_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("lectern.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());

        let conn = db.lock().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('jobs', 'lecture_media', 'transcripts', 'transcript_segments',
                  'reference_documents', 'reference_pages', 'study_materials')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 7);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lectern.db");
        drop(Database::open(&path).unwrap());
        assert!(Database::open(&path).is_ok());
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(earlier) < format_timestamp(later));
        let parsed = parse_timestamp(&format_timestamp(earlier));
        assert_eq!(parsed.timestamp_micros(), earlier.timestamp_micros());
    }
}
