//! Lecture media, transcripts, reference documents and study material.

mod store;
mod types;

pub use store::{SqliteStudyStore, StudyStoreError};
pub use types::{
    ExtractionStatus, LectureMedia, MaterialKind, MaterialStatus, NewMaterial, ReferenceDocument,
    ReferencePage, StudyMaterial, Transcript,
};
