//! INGEST_DOCUMENTS: OCR a lecture's reference documents page by page.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::HandlerSettings;
use crate::document::{DocumentProcessor, PageText};
use crate::jobs::{HandlerError, JobContext, JobHandler, JobPayload, JobType};
use crate::progress::ScaledProgress;
use crate::study::{ReferenceDocument, ReferencePage, SqliteStudyStore};

pub struct IngestDocumentsHandler {
    study: SqliteStudyStore,
    processor: Arc<DocumentProcessor>,
    settings: Arc<HandlerSettings>,
}

impl IngestDocumentsHandler {
    pub fn new(
        study: SqliteStudyStore,
        processor: Arc<DocumentProcessor>,
        settings: Arc<HandlerSettings>,
    ) -> Self {
        Self {
            study,
            processor,
            settings,
        }
    }

    fn select_documents(
        &self,
        lecture_id: &str,
        document_ids: &[String],
    ) -> Result<Vec<ReferenceDocument>, HandlerError> {
        if document_ids.is_empty() {
            return Ok(self.study.lecture_documents(lecture_id)?);
        }

        let mut documents = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            let document = self
                .study
                .get_reference_document(id)?
                .ok_or_else(|| HandlerError::NotFound(format!("document {}", id)))?;
            if document.lecture_id != lecture_id {
                return Err(HandlerError::Payload(format!(
                    "document {} belongs to lecture {}, not {}",
                    id, document.lecture_id, lecture_id
                )));
            }
            documents.push(document);
        }
        Ok(documents)
    }

    /// Runs one document through the processor and commits its pages.
    async fn ingest_one(
        &self,
        ctx: &JobContext,
        document: &ReferenceDocument,
        index: usize,
        total: usize,
        language: &str,
    ) -> Result<usize, HandlerError> {
        self.study.mark_document_processing(&document.id)?;

        let start = (index * 100 / total) as u8;
        let end = ((index + 1) * 100 / total) as u8;
        let band = ScaledProgress::new(ctx, start, end);
        let scratch = ctx.scratch_dir().join(format!("doc-{:03}", index));

        let meter = ctx.usage_meter(self.settings.max_cost_per_job);
        let output = self
            .processor
            .process(
                &document.path,
                language,
                &scratch,
                &band,
                &meter,
                ctx.cancel_token(),
            )
            .await?;
        ctx.ensure_not_cancelled()?;

        let failed_pages = output.failed_pages();
        if !failed_pages.is_empty() {
            warn!(
                job_id = %ctx.job_id(),
                document_id = %document.id,
                pages = ?failed_pages,
                "Document stored with OCR failure markers"
            );
        }

        let target = self
            .settings
            .data_dir
            .join("documents")
            .join(&document.id)
            .join(ctx.job_id());
        let pages = store_page_images(&output.pages, &target).await?;
        self.study.commit_reference_pages(&document.id, &pages)?;
        remove_stale_page_dirs(&target).await;

        Ok(pages.len())
    }
}

#[async_trait]
impl JobHandler for IngestDocumentsHandler {
    fn job_type(&self) -> JobType {
        JobType::IngestDocuments
    }

    async fn handle(
        &self,
        ctx: &JobContext,
        payload: JobPayload,
    ) -> Result<Option<Value>, HandlerError> {
        let JobPayload::IngestDocuments(payload) = payload else {
            return Err(HandlerError::Payload(
                "expected an ingest_documents payload".to_string(),
            ));
        };
        let language = payload
            .language
            .unwrap_or_else(|| self.settings.language.clone());

        let documents = self.select_documents(&payload.lecture_id, &payload.document_ids)?;
        if documents.is_empty() {
            return Err(HandlerError::NotFound(format!(
                "no reference documents for lecture {}",
                payload.lecture_id
            )));
        }

        let total = documents.len();
        info!(job_id = %ctx.job_id(), lecture_id = %payload.lecture_id, documents = total, "Ingesting documents");

        let mut ingested = Vec::new();
        let mut failures = Vec::new();

        for (index, document) in documents.iter().enumerate() {
            ctx.ensure_not_cancelled()?;

            match self
                .ingest_one(ctx, document, index, total, &language)
                .await
            {
                Ok(pages) => ingested.push(json!({"document_id": document.id, "pages": pages})),
                Err(e) => {
                    if let Err(store_err) = self.study.fail_document(&document.id, &e.to_string()) {
                        warn!(document_id = %document.id, error = %store_err, "Failed to mark document failed");
                    }
                    // Cancellation and the cost ceiling stop the whole job.
                    if e.is_cancellation() || matches!(e, HandlerError::CostLimit(_)) {
                        return Err(e);
                    }
                    warn!(job_id = %ctx.job_id(), document_id = %document.id, error = %e, "Document ingestion failed");
                    failures.push(format!("{}: {}", document.title, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(HandlerError::Other(format!(
                "{} of {} document(s) failed: {}",
                failures.len(),
                total,
                failures.join("; ")
            )));
        }

        Ok(Some(json!({ "documents": ingested })))
    }
}

/// Copies page images out of the scratch directory into `target`.
async fn store_page_images(
    pages: &[PageText],
    target: &Path,
) -> Result<Vec<ReferencePage>, HandlerError> {
    tokio::fs::create_dir_all(target).await?;

    let mut stored = Vec::with_capacity(pages.len());
    for page in pages {
        let image_path: PathBuf = target.join(format!("page-{:04}.png", page.page_number));
        tokio::fs::copy(&page.image_path, &image_path).await?;
        stored.push(ReferencePage {
            page_number: page.page_number,
            image_path,
            text: page.text.clone(),
        });
    }
    Ok(stored)
}

/// Removes page images of earlier runs once `current` is committed.
async fn remove_stale_page_dirs(current: &Path) {
    let Some(parent) = current.parent() else {
        return;
    };
    let Ok(mut entries) = tokio::fs::read_dir(parent).await else {
        return;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path != current && path.is_dir() {
            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove stale page images");
            }
        }
    }
}
