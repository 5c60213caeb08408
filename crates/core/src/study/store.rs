//! SQLite-backed store for lecture media, transcripts, reference documents
//! and study material.
//!
//! Handler results are written with the `commit_*` operations, each of which
//! replaces the previous rows inside one transaction.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use super::types::{
    ExtractionStatus, LectureMedia, MaterialKind, MaterialStatus, NewMaterial, ReferenceDocument,
    ReferencePage, StudyMaterial, Transcript,
};
use crate::db::{format_timestamp, parse_optional_timestamp, parse_timestamp, Database, DbError};
use crate::media::MediaKind;
use crate::transcription::{StitchedSegment, TranscriptionOutput};

#[derive(Debug, Error)]
pub enum StudyStoreError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<DbError> for StudyStoreError {
    fn from(e: DbError) -> Self {
        StudyStoreError::Database(e.to_string())
    }
}

impl From<rusqlite::Error> for StudyStoreError {
    fn from(e: rusqlite::Error) -> Self {
        StudyStoreError::Database(e.to_string())
    }
}

const MEDIA_COLUMNS: &str = "id, lecture_id, path, kind, sequence_order, duration_ms, created_at";
const TRANSCRIPT_COLUMNS: &str =
    "id, lecture_id, language, status, confidence, error, created_at, updated_at";
const DOCUMENT_COLUMNS: &str =
    "id, lecture_id, title, path, status, page_count, error, created_at, updated_at";
const MATERIAL_COLUMNS: &str =
    "id, lecture_id, kind, language, model, content, status, created_at, published_at";

#[derive(Clone)]
pub struct SqliteStudyStore {
    db: Database,
}

impl SqliteStudyStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // Lecture media

    pub fn add_lecture_media(
        &self,
        lecture_id: &str,
        path: &Path,
        kind: MediaKind,
        sequence_order: i64,
    ) -> Result<LectureMedia, StudyStoreError> {
        let conn = self.db.lock()?;
        let media = LectureMedia {
            id: uuid::Uuid::new_v4().to_string(),
            lecture_id: lecture_id.to_string(),
            path: path.to_path_buf(),
            kind,
            sequence_order,
            duration_ms: None,
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO lecture_media (id, lecture_id, path, kind, sequence_order, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                media.id,
                media.lecture_id,
                path_to_string(&media.path),
                kind.as_str(),
                sequence_order,
                format_timestamp(media.created_at),
            ],
        )?;
        Ok(media)
    }

    /// Media of a lecture in playback order.
    pub fn list_lecture_media(&self, lecture_id: &str) -> Result<Vec<LectureMedia>, StudyStoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM lecture_media WHERE lecture_id = ? \
             ORDER BY sequence_order ASC, created_at ASC",
            MEDIA_COLUMNS
        ))?;
        let media = stmt
            .query_map(params![lecture_id], row_to_media)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(media)
    }

    // Transcripts

    /// Create the lecture's transcript, or reset an existing one to processing.
    ///
    /// Existing segments stay until [`Self::commit_transcript`] replaces them.
    pub fn begin_transcript(
        &self,
        lecture_id: &str,
        language: &str,
    ) -> Result<Transcript, StudyStoreError> {
        let conn = self.db.lock()?;
        let now = format_timestamp(Utc::now());
        conn.execute(
            "INSERT INTO transcripts (id, lecture_id, language, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, 'processing', ?4, ?4) \
             ON CONFLICT(lecture_id) DO UPDATE SET \
                 language = excluded.language, status = 'processing', error = NULL, \
                 updated_at = excluded.updated_at",
            params![uuid::Uuid::new_v4().to_string(), lecture_id, language, now],
        )?;
        fetch_transcript_by_lecture(&conn, lecture_id)?
            .ok_or_else(|| StudyStoreError::NotFound(format!("transcript for lecture {}", lecture_id)))
    }

    /// Replace the transcript's segments and record media durations, atomically.
    pub fn commit_transcript(
        &self,
        transcript_id: &str,
        output: &TranscriptionOutput,
    ) -> Result<Transcript, StudyStoreError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        if fetch_transcript(&tx, transcript_id)?.is_none() {
            return Err(StudyStoreError::NotFound(format!("transcript {}", transcript_id)));
        }

        tx.execute(
            "DELETE FROM transcript_segments WHERE transcript_id = ?",
            params![transcript_id],
        )?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO transcript_segments \
                 (transcript_id, media_id, seq, start_ms, end_ms, original_start_ms, \
                  original_end_ms, text, confidence, speaker) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for (seq, segment) in output.segments.iter().enumerate() {
                insert.execute(params![
                    transcript_id,
                    segment.media_id,
                    seq as i64,
                    segment.start_ms as i64,
                    segment.end_ms as i64,
                    segment.original_start_ms as i64,
                    segment.original_end_ms as i64,
                    segment.text,
                    segment.confidence,
                    segment.speaker,
                ])?;
            }

            let mut duration = tx.prepare("UPDATE lecture_media SET duration_ms = ? WHERE id = ?")?;
            for media in &output.durations {
                duration.execute(params![media.duration_ms as i64, media.media_id])?;
            }
        }

        tx.execute(
            "UPDATE transcripts SET status = 'completed', confidence = ?2, error = NULL, \
                 updated_at = ?3 \
             WHERE id = ?1",
            params![
                transcript_id,
                output.confidence,
                format_timestamp(Utc::now())
            ],
        )?;

        let transcript = fetch_transcript(&tx, transcript_id)?
            .ok_or_else(|| StudyStoreError::NotFound(format!("transcript {}", transcript_id)))?;
        tx.commit()?;
        Ok(transcript)
    }

    pub fn fail_transcript(&self, transcript_id: &str, error: &str) -> Result<(), StudyStoreError> {
        let conn = self.db.lock()?;
        conn.execute(
            "UPDATE transcripts SET status = 'failed', error = ?2, updated_at = ?3 WHERE id = ?1",
            params![transcript_id, error, format_timestamp(Utc::now())],
        )?;
        Ok(())
    }

    pub fn get_transcript(&self, lecture_id: &str) -> Result<Option<Transcript>, StudyStoreError> {
        let conn = self.db.lock()?;
        fetch_transcript_by_lecture(&conn, lecture_id)
    }

    /// Segments on the unified timeline, in order.
    pub fn transcript_segments(
        &self,
        transcript_id: &str,
    ) -> Result<Vec<StitchedSegment>, StudyStoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT media_id, start_ms, end_ms, original_start_ms, original_end_ms, text, \
                    confidence, speaker \
             FROM transcript_segments WHERE transcript_id = ? ORDER BY seq ASC",
        )?;
        let segments = stmt
            .query_map(params![transcript_id], |row| {
                Ok(StitchedSegment {
                    media_id: row.get(0)?,
                    start_ms: row.get::<_, i64>(1)?.max(0) as u64,
                    end_ms: row.get::<_, i64>(2)?.max(0) as u64,
                    original_start_ms: row.get::<_, i64>(3)?.max(0) as u64,
                    original_end_ms: row.get::<_, i64>(4)?.max(0) as u64,
                    text: row.get(5)?,
                    confidence: row.get(6)?,
                    speaker: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(segments)
    }

    // Reference documents

    pub fn add_reference_document(
        &self,
        lecture_id: &str,
        title: &str,
        path: &Path,
    ) -> Result<ReferenceDocument, StudyStoreError> {
        let conn = self.db.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        conn.execute(
            "INSERT INTO reference_documents (id, lecture_id, title, path, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)",
            params![id, lecture_id, title, path_to_string(path), now],
        )?;
        fetch_document(&conn, &id)?
            .ok_or_else(|| StudyStoreError::NotFound(format!("document {}", id)))
    }

    pub fn get_reference_document(
        &self,
        id: &str,
    ) -> Result<Option<ReferenceDocument>, StudyStoreError> {
        let conn = self.db.lock()?;
        fetch_document(&conn, id)
    }

    pub fn lecture_documents(
        &self,
        lecture_id: &str,
    ) -> Result<Vec<ReferenceDocument>, StudyStoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reference_documents WHERE lecture_id = ? ORDER BY created_at ASC",
            DOCUMENT_COLUMNS
        ))?;
        let documents = stmt
            .query_map(params![lecture_id], row_to_document)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(documents)
    }

    pub fn mark_document_processing(&self, id: &str) -> Result<(), StudyStoreError> {
        self.set_document_status(id, ExtractionStatus::Processing, None)
    }

    pub fn fail_document(&self, id: &str, error: &str) -> Result<(), StudyStoreError> {
        self.set_document_status(id, ExtractionStatus::Failed, Some(error))
    }

    fn set_document_status(
        &self,
        id: &str,
        status: ExtractionStatus,
        error: Option<&str>,
    ) -> Result<(), StudyStoreError> {
        let conn = self.db.lock()?;
        let updated = conn.execute(
            "UPDATE reference_documents SET status = ?2, error = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, status.as_str(), error, format_timestamp(Utc::now())],
        )?;
        if updated == 0 {
            return Err(StudyStoreError::NotFound(format!("document {}", id)));
        }
        Ok(())
    }

    /// Replace every page of a document and mark it completed, atomically.
    pub fn commit_reference_pages(
        &self,
        document_id: &str,
        pages: &[ReferencePage],
    ) -> Result<ReferenceDocument, StudyStoreError> {
        let mut conn = self.db.lock()?;
        let tx = conn.transaction()?;

        if fetch_document(&tx, document_id)?.is_none() {
            return Err(StudyStoreError::NotFound(format!("document {}", document_id)));
        }

        tx.execute(
            "DELETE FROM reference_pages WHERE document_id = ?",
            params![document_id],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO reference_pages (document_id, page_number, image_path, text) \
                 VALUES (?, ?, ?, ?)",
            )?;
            for page in pages {
                insert.execute(params![
                    document_id,
                    page.page_number,
                    path_to_string(&page.image_path),
                    page.text,
                ])?;
            }
        }

        tx.execute(
            "UPDATE reference_documents SET status = 'completed', page_count = ?2, error = NULL, \
                 updated_at = ?3 \
             WHERE id = ?1",
            params![document_id, pages.len() as i64, format_timestamp(Utc::now())],
        )?;

        let document = fetch_document(&tx, document_id)?
            .ok_or_else(|| StudyStoreError::NotFound(format!("document {}", document_id)))?;
        tx.commit()?;
        Ok(document)
    }

    pub fn reference_pages(&self, document_id: &str) -> Result<Vec<ReferencePage>, StudyStoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(
            "SELECT page_number, image_path, text FROM reference_pages \
             WHERE document_id = ? ORDER BY page_number ASC",
        )?;
        let pages = stmt
            .query_map(params![document_id], |row| {
                Ok(ReferencePage {
                    page_number: row.get(0)?,
                    image_path: PathBuf::from(row.get::<_, String>(1)?),
                    text: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pages)
    }

    // Study material

    pub fn insert_material(&self, material: NewMaterial) -> Result<StudyMaterial, StudyStoreError> {
        let conn = self.db.lock()?;
        let material = StudyMaterial {
            id: uuid::Uuid::new_v4().to_string(),
            lecture_id: material.lecture_id,
            kind: material.kind,
            language: material.language,
            model: material.model,
            content: material.content,
            status: MaterialStatus::Draft,
            created_at: Utc::now(),
            published_at: None,
        };
        conn.execute(
            "INSERT INTO study_materials (id, lecture_id, kind, language, model, content, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                material.id,
                material.lecture_id,
                material.kind.as_str(),
                material.language,
                material.model,
                material.content,
                material.status.as_str(),
                format_timestamp(material.created_at),
            ],
        )?;
        Ok(material)
    }

    pub fn get_material(&self, id: &str) -> Result<Option<StudyMaterial>, StudyStoreError> {
        let conn = self.db.lock()?;
        fetch_material(&conn, id)
    }

    pub fn lecture_materials(&self, lecture_id: &str) -> Result<Vec<StudyMaterial>, StudyStoreError> {
        let conn = self.db.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM study_materials WHERE lecture_id = ? ORDER BY created_at ASC",
            MATERIAL_COLUMNS
        ))?;
        let materials = stmt
            .query_map(params![lecture_id], row_to_material)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(materials)
    }

    /// Move a draft to published. Fails when missing or already published.
    pub fn publish_material(&self, id: &str) -> Result<StudyMaterial, StudyStoreError> {
        let conn = self.db.lock()?;
        let updated = conn.execute(
            "UPDATE study_materials SET status = 'published', published_at = ?2 \
             WHERE id = ?1 AND status = 'draft'",
            params![id, format_timestamp(Utc::now())],
        )?;
        let material = fetch_material(&conn, id)?
            .ok_or_else(|| StudyStoreError::NotFound(format!("material {}", id)))?;
        if updated == 0 {
            return Err(StudyStoreError::InvalidState(format!(
                "material {} is already published",
                id
            )));
        }
        Ok(material)
    }
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<LectureMedia> {
    let kind: String = row.get(3)?;
    Ok(LectureMedia {
        id: row.get(0)?,
        lecture_id: row.get(1)?,
        path: PathBuf::from(row.get::<_, String>(2)?),
        kind: MediaKind::parse(&kind).unwrap_or(MediaKind::Video),
        sequence_order: row.get(4)?,
        duration_ms: row.get::<_, Option<i64>>(5)?.map(|d| d.max(0) as u64),
        created_at: parse_timestamp(&row.get::<_, String>(6)?),
    })
}

fn row_to_transcript(row: &rusqlite::Row) -> rusqlite::Result<Transcript> {
    Ok(Transcript {
        id: row.get(0)?,
        lecture_id: row.get(1)?,
        language: row.get(2)?,
        status: ExtractionStatus::parse(&row.get::<_, String>(3)?),
        confidence: row.get(4)?,
        error: row.get(5)?,
        created_at: parse_timestamp(&row.get::<_, String>(6)?),
        updated_at: parse_timestamp(&row.get::<_, String>(7)?),
    })
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<ReferenceDocument> {
    Ok(ReferenceDocument {
        id: row.get(0)?,
        lecture_id: row.get(1)?,
        title: row.get(2)?,
        path: PathBuf::from(row.get::<_, String>(3)?),
        status: ExtractionStatus::parse(&row.get::<_, String>(4)?),
        page_count: row.get(5)?,
        error: row.get(6)?,
        created_at: parse_timestamp(&row.get::<_, String>(7)?),
        updated_at: parse_timestamp(&row.get::<_, String>(8)?),
    })
}

fn row_to_material(row: &rusqlite::Row) -> rusqlite::Result<StudyMaterial> {
    let kind: String = row.get(2)?;
    let status: String = row.get(6)?;
    Ok(StudyMaterial {
        id: row.get(0)?,
        lecture_id: row.get(1)?,
        kind: MaterialKind::parse(&kind).unwrap_or(MaterialKind::Summary),
        language: row.get(3)?,
        model: row.get(4)?,
        content: row.get(5)?,
        status: if status == "published" {
            MaterialStatus::Published
        } else {
            MaterialStatus::Draft
        },
        created_at: parse_timestamp(&row.get::<_, String>(7)?),
        published_at: parse_optional_timestamp(row.get(8)?),
    })
}

fn fetch_transcript(conn: &Connection, id: &str) -> Result<Option<Transcript>, StudyStoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM transcripts WHERE id = ?", TRANSCRIPT_COLUMNS),
            params![id],
            row_to_transcript,
        )
        .optional()?)
}

fn fetch_transcript_by_lecture(
    conn: &Connection,
    lecture_id: &str,
) -> Result<Option<Transcript>, StudyStoreError> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM transcripts WHERE lecture_id = ?",
                TRANSCRIPT_COLUMNS
            ),
            params![lecture_id],
            row_to_transcript,
        )
        .optional()?)
}

fn fetch_document(
    conn: &Connection,
    id: &str,
) -> Result<Option<ReferenceDocument>, StudyStoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM reference_documents WHERE id = ?", DOCUMENT_COLUMNS),
            params![id],
            row_to_document,
        )
        .optional()?)
}

fn fetch_material(conn: &Connection, id: &str) -> Result<Option<StudyMaterial>, StudyStoreError> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM study_materials WHERE id = ?", MATERIAL_COLUMNS),
            params![id],
            row_to_material,
        )
        .optional()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::MediaDuration;

    fn store() -> SqliteStudyStore {
        SqliteStudyStore::new(Database::in_memory().unwrap())
    }

    fn segment(media_id: &str, start_ms: u64, end_ms: u64, text: &str) -> StitchedSegment {
        StitchedSegment {
            media_id: media_id.to_string(),
            start_ms,
            end_ms,
            original_start_ms: start_ms,
            original_end_ms: end_ms,
            text: text.to_string(),
            confidence: Some(0.9),
            speaker: None,
        }
    }

    fn output(segments: Vec<StitchedSegment>, durations: Vec<MediaDuration>) -> TranscriptionOutput {
        TranscriptionOutput {
            total_duration_ms: durations.iter().map(|d| d.duration_ms).sum(),
            confidence: Some(0.9),
            segments,
            durations,
        }
    }

    #[test]
    fn test_media_listed_in_sequence_order() {
        let store = store();
        store
            .add_lecture_media("lec", Path::new("/m/part2.mp4"), MediaKind::Video, 2)
            .unwrap();
        store
            .add_lecture_media("lec", Path::new("/m/part1.mp3"), MediaKind::Audio, 1)
            .unwrap();
        store
            .add_lecture_media("other", Path::new("/m/x.mp3"), MediaKind::Audio, 0)
            .unwrap();

        let media = store.list_lecture_media("lec").unwrap();
        let orders: Vec<i64> = media.iter().map(|m| m.sequence_order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert_eq!(media[0].kind, MediaKind::Audio);
    }

    #[test]
    fn test_rerun_replaces_segments() {
        let store = store();
        let media = store
            .add_lecture_media("lec", Path::new("/m/a.mp3"), MediaKind::Audio, 1)
            .unwrap();

        let transcript = store.begin_transcript("lec", "en").unwrap();
        assert_eq!(transcript.status, ExtractionStatus::Processing);
        store
            .commit_transcript(
                &transcript.id,
                &output(
                    vec![
                        segment(&media.id, 0, 1000, "one"),
                        segment(&media.id, 1000, 2000, "two"),
                        segment(&media.id, 2000, 3000, "three"),
                    ],
                    vec![MediaDuration {
                        media_id: media.id.clone(),
                        duration_ms: 3000,
                    }],
                ),
            )
            .unwrap();

        let again = store.begin_transcript("lec", "de").unwrap();
        assert_eq!(again.id, transcript.id);
        assert_eq!(store.transcript_segments(&transcript.id).unwrap().len(), 3);

        let done = store
            .commit_transcript(
                &transcript.id,
                &output(vec![segment(&media.id, 0, 900, "eins")], vec![]),
            )
            .unwrap();
        assert_eq!(done.status, ExtractionStatus::Completed);
        assert_eq!(done.language, "de");

        let segments = store.transcript_segments(&transcript.id).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "eins");
        assert_eq!(
            store.list_lecture_media("lec").unwrap()[0].duration_ms,
            Some(3000)
        );
    }

    #[test]
    fn test_commit_for_unknown_transcript_rolls_back() {
        let store = store();
        let err = store
            .commit_transcript("missing", &output(vec![segment("m", 0, 1, "x")], vec![]))
            .unwrap_err();
        assert!(matches!(err, StudyStoreError::NotFound(_)));
        assert!(store.transcript_segments("missing").unwrap().is_empty());
    }

    #[test]
    fn test_fail_transcript_keeps_previous_segments() {
        let store = store();
        let transcript = store.begin_transcript("lec", "en").unwrap();
        store
            .commit_transcript(&transcript.id, &output(vec![segment("m", 0, 10, "kept")], vec![]))
            .unwrap();

        store.begin_transcript("lec", "en").unwrap();
        store.fail_transcript(&transcript.id, "probe failed").unwrap();

        let transcript = store.get_transcript("lec").unwrap().unwrap();
        assert_eq!(transcript.status, ExtractionStatus::Failed);
        assert_eq!(transcript.error.as_deref(), Some("probe failed"));
        assert_eq!(store.transcript_segments(&transcript.id).unwrap().len(), 1);
    }

    #[test]
    fn test_reference_pages_replaced_on_reprocess() {
        let store = store();
        let doc = store
            .add_reference_document("lec", "Week 1", Path::new("/docs/week1.pptx"))
            .unwrap();
        assert_eq!(doc.status, ExtractionStatus::Pending);

        let page = |n: u32, text: &str| ReferencePage {
            page_number: n,
            image_path: PathBuf::from(format!("/data/{}.png", n)),
            text: text.to_string(),
        };

        store
            .commit_reference_pages(&doc.id, &[page(1, "a"), page(2, "b"), page(3, "c")])
            .unwrap();
        let doc = store
            .commit_reference_pages(&doc.id, &[page(1, "A"), page(2, "B")])
            .unwrap();

        assert_eq!(doc.status, ExtractionStatus::Completed);
        assert_eq!(doc.page_count, Some(2));
        let pages = store.reference_pages(&doc.id).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "B");
    }

    #[test]
    fn test_publish_material_once() {
        let store = store();
        let material = store
            .insert_material(NewMaterial {
                lecture_id: "lec".to_string(),
                kind: MaterialKind::Flashcards,
                language: "en".to_string(),
                model: "gpt-4o-mini".to_string(),
                content: "Q: A?".to_string(),
            })
            .unwrap();
        assert_eq!(material.status, MaterialStatus::Draft);

        let published = store.publish_material(&material.id).unwrap();
        assert_eq!(published.status, MaterialStatus::Published);
        assert!(published.published_at.is_some());

        assert!(matches!(
            store.publish_material(&material.id),
            Err(StudyStoreError::InvalidState(_))
        ));
        assert!(matches!(
            store.publish_material("missing"),
            Err(StudyStoreError::NotFound(_))
        ));
        assert_eq!(store.lecture_materials("lec").unwrap().len(), 1);
    }
}
