//! Study domain rows the job handlers read and write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::media::MediaKind;
use crate::transcription::MediaFile;

/// One recording attached to a lecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureMedia {
    pub id: String,
    pub lecture_id: String,
    pub path: PathBuf,
    pub kind: MediaKind,
    pub sequence_order: i64,
    /// Probed duration, filled in by the last successful transcription.
    pub duration_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
}

impl LectureMedia {
    pub fn to_media_file(&self) -> MediaFile {
        MediaFile {
            id: self.id.clone(),
            path: self.path.clone(),
            kind: self.kind,
            sequence_order: self.sequence_order,
        }
    }
}

/// Extraction status shared by transcripts and reference documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStatus::Pending => "pending",
            ExtractionStatus::Processing => "processing",
            ExtractionStatus::Completed => "completed",
            ExtractionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "processing" => ExtractionStatus::Processing,
            "completed" => ExtractionStatus::Completed,
            "failed" => ExtractionStatus::Failed,
            _ => ExtractionStatus::Pending,
        }
    }
}

/// The single transcript of a lecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub id: String,
    pub lecture_id: String,
    pub language: String,
    pub status: ExtractionStatus,
    pub confidence: Option<f64>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceDocument {
    pub id: String,
    pub lecture_id: String,
    pub title: String,
    pub path: PathBuf,
    pub status: ExtractionStatus,
    pub page_count: Option<u32>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Rendered page of a reference document with its extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePage {
    /// 1-based and contiguous within a document.
    pub page_number: u32,
    pub image_path: PathBuf,
    pub text: String,
}

/// Kind of generated study material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Summary,
    Flashcards,
    Quiz,
    StudyGuide,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Summary => "summary",
            MaterialKind::Flashcards => "flashcards",
            MaterialKind::Quiz => "quiz",
            MaterialKind::StudyGuide => "study_guide",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "summary" => Some(MaterialKind::Summary),
            "flashcards" => Some(MaterialKind::Flashcards),
            "quiz" => Some(MaterialKind::Quiz),
            "study_guide" => Some(MaterialKind::StudyGuide),
            _ => None,
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialStatus {
    Draft,
    Published,
}

impl MaterialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialStatus::Draft => "draft",
            MaterialStatus::Published => "published",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyMaterial {
    pub id: String,
    pub lecture_id: String,
    pub kind: MaterialKind,
    pub language: String,
    pub model: String,
    pub content: String,
    pub status: MaterialStatus,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

/// Input for [`super::SqliteStudyStore::insert_material`].
#[derive(Debug, Clone)]
pub struct NewMaterial {
    pub lecture_id: String,
    pub kind: MaterialKind,
    pub language: String,
    pub model: String,
    pub content: String,
}
