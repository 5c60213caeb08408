//! TRANSCRIBE_MEDIA: one transcript for all of a lecture's media.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::HandlerSettings;
use crate::jobs::{HandlerError, JobContext, JobHandler, JobPayload, JobType};
use crate::progress::{ProgressReporter, ScaledProgress};
use crate::study::SqliteStudyStore;
use crate::transcription::{MediaFile, TranscriptionService};

/// Share of progress spent transcribing. The rest covers the commit.
const TRANSCRIBE_BAND_END: u8 = 95;

pub struct TranscribeMediaHandler {
    study: SqliteStudyStore,
    service: Arc<TranscriptionService>,
    settings: Arc<HandlerSettings>,
}

impl TranscribeMediaHandler {
    pub fn new(
        study: SqliteStudyStore,
        service: Arc<TranscriptionService>,
        settings: Arc<HandlerSettings>,
    ) -> Self {
        Self {
            study,
            service,
            settings,
        }
    }

    fn mark_failed(&self, transcript_id: &str, error: &HandlerError) {
        if let Err(e) = self.study.fail_transcript(transcript_id, &error.to_string()) {
            warn!(transcript_id, error = %e, "Failed to mark transcript failed");
        }
    }
}

#[async_trait]
impl JobHandler for TranscribeMediaHandler {
    fn job_type(&self) -> JobType {
        JobType::TranscribeMedia
    }

    async fn handle(
        &self,
        ctx: &JobContext,
        payload: JobPayload,
    ) -> Result<Option<Value>, HandlerError> {
        let JobPayload::TranscribeMedia(payload) = payload else {
            return Err(HandlerError::Payload(
                "expected a transcribe_media payload".to_string(),
            ));
        };
        let language = payload
            .language
            .unwrap_or_else(|| self.settings.language.clone());

        let media = self.study.list_lecture_media(&payload.lecture_id)?;
        if media.is_empty() {
            return Err(HandlerError::NotFound(format!(
                "no media for lecture {}",
                payload.lecture_id
            )));
        }
        let files: Vec<MediaFile> = media.iter().map(|m| m.to_media_file()).collect();

        let transcript = self.study.begin_transcript(&payload.lecture_id, &language)?;
        info!(
            job_id = %ctx.job_id(),
            lecture_id = %payload.lecture_id,
            files = files.len(),
            "Transcribing lecture"
        );

        let band = ScaledProgress::new(ctx, 0, TRANSCRIBE_BAND_END);
        let meter = ctx.usage_meter(self.settings.max_cost_per_job);
        let result = self
            .service
            .transcribe_all(
                &files,
                &language,
                ctx.scratch_dir(),
                &band,
                &meter,
                ctx.cancel_token(),
            )
            .await
            .map_err(HandlerError::from)
            .and_then(|output| {
                ctx.ensure_not_cancelled()?;
                Ok(output)
            });

        let output = match result {
            Ok(output) => output,
            Err(e) => {
                self.mark_failed(&transcript.id, &e);
                return Err(e);
            }
        };

        ctx.report(TRANSCRIBE_BAND_END, "Saving transcript");
        let transcript = match self.study.commit_transcript(&transcript.id, &output) {
            Ok(transcript) => transcript,
            Err(e) => {
                let e = HandlerError::from(e);
                self.mark_failed(&transcript.id, &e);
                return Err(e);
            }
        };

        Ok(Some(json!({
            "transcript_id": transcript.id,
            "segments": output.segments.len(),
            "duration_ms": output.total_duration_ms,
            "confidence": output.confidence,
        })))
    }
}
