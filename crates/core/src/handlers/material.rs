//! BUILD_MATERIAL and PUBLISH_MATERIAL.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::HandlerSettings;
use crate::jobs::{HandlerError, JobContext, JobHandler, JobPayload, JobType};
use crate::provider::{complete, ChatRequest, Message, Provider};
use crate::study::{ExtractionStatus, MaterialKind, NewMaterial, SqliteStudyStore};

/// Upper bound on lecture text sent to the model.
const MAX_SOURCE_CHARS: usize = 120_000;

fn instructions(kind: MaterialKind) -> &'static str {
    match kind {
        MaterialKind::Summary => {
            "Write a structured summary of the lecture in markdown. Use headings for the \
             main topics and keep definitions and formulas exact."
        }
        MaterialKind::Flashcards => {
            "Write study flashcards for the lecture in markdown. Each card is a line \
             starting with 'Q:' followed by a line starting with 'A:'. Cover every key term."
        }
        MaterialKind::Quiz => {
            "Write a multiple-choice quiz on the lecture in markdown. Give each question four \
             options labelled A-D and list the correct answers at the end."
        }
        MaterialKind::StudyGuide => {
            "Write a study guide for the lecture in markdown: learning goals, key concepts \
             with explanations, worked examples where the material has them, and review questions."
        }
    }
}

pub struct BuildMaterialHandler {
    study: SqliteStudyStore,
    provider: Arc<dyn Provider>,
    settings: Arc<HandlerSettings>,
}

impl BuildMaterialHandler {
    pub fn new(
        study: SqliteStudyStore,
        provider: Arc<dyn Provider>,
        settings: Arc<HandlerSettings>,
    ) -> Self {
        Self {
            study,
            provider,
            settings,
        }
    }

    /// Completed transcript text followed by OCR'd reference pages.
    fn gather_source(&self, lecture_id: &str) -> Result<String, HandlerError> {
        let mut source = String::new();

        if let Some(transcript) = self.study.get_transcript(lecture_id)? {
            if transcript.status == ExtractionStatus::Completed {
                let segments = self.study.transcript_segments(&transcript.id)?;
                if !segments.is_empty() {
                    source.push_str("# Lecture transcript\n\n");
                    for segment in segments {
                        source.push_str(segment.text.trim());
                        source.push('\n');
                    }
                }
            }
        }

        for document in self.study.lecture_documents(lecture_id)? {
            if document.status != ExtractionStatus::Completed {
                continue;
            }
            source.push_str(&format!("\n# Reference: {}\n", document.title));
            for page in self.study.reference_pages(&document.id)? {
                source.push_str(&format!("\n## Page {}\n{}\n", page.page_number, page.text.trim()));
            }
        }

        if source.chars().count() > MAX_SOURCE_CHARS {
            source = source.chars().take(MAX_SOURCE_CHARS).collect();
        }
        Ok(source)
    }
}

#[async_trait]
impl JobHandler for BuildMaterialHandler {
    fn job_type(&self) -> JobType {
        JobType::BuildMaterial
    }

    async fn handle(
        &self,
        ctx: &JobContext,
        payload: JobPayload,
    ) -> Result<Option<Value>, HandlerError> {
        let JobPayload::BuildMaterial(payload) = payload else {
            return Err(HandlerError::Payload(
                "expected a build_material payload".to_string(),
            ));
        };
        let language = payload
            .language
            .unwrap_or_else(|| self.settings.language.clone());
        let model = payload
            .model
            .unwrap_or_else(|| self.settings.material_model.clone());

        ctx.update_progress(0, "Gathering lecture content");
        let source = self.gather_source(&payload.lecture_id)?;
        if source.trim().is_empty() {
            return Err(HandlerError::NotFound(format!(
                "no transcript or reference text for lecture {}",
                payload.lecture_id
            )));
        }

        ctx.update_progress(10, &format!("Generating {}", payload.kind));
        let request = ChatRequest::new(model.clone())
            .with_message(Message::system(format!(
                "You create study material for university students. {} Write in language: {}.",
                instructions(payload.kind),
                language
            )))
            .with_message(Message::user(source))
            .with_temperature(0.3);

        let completion = complete(self.provider.as_ref(), request, ctx.cancel_token()).await?;
        ctx.record_usage(&completion.usage, self.settings.max_cost_per_job)?;
        ctx.ensure_not_cancelled()?;

        let content = completion.text.trim();
        if content.is_empty() {
            return Err(HandlerError::Other("model returned empty material".to_string()));
        }

        ctx.update_progress(90, "Saving material");
        let material = self.study.insert_material(NewMaterial {
            lecture_id: payload.lecture_id,
            kind: payload.kind,
            language,
            model,
            content: content.to_string(),
        })?;
        info!(job_id = %ctx.job_id(), material_id = %material.id, kind = %material.kind, "Material generated");

        Ok(Some(json!({
            "material_id": material.id,
            "kind": material.kind,
            "characters": material.content.chars().count(),
        })))
    }
}

pub struct PublishMaterialHandler {
    study: SqliteStudyStore,
}

impl PublishMaterialHandler {
    pub fn new(study: SqliteStudyStore) -> Self {
        Self { study }
    }
}

#[async_trait]
impl JobHandler for PublishMaterialHandler {
    fn job_type(&self) -> JobType {
        JobType::PublishMaterial
    }

    async fn handle(
        &self,
        ctx: &JobContext,
        payload: JobPayload,
    ) -> Result<Option<Value>, HandlerError> {
        let JobPayload::PublishMaterial(payload) = payload else {
            return Err(HandlerError::Payload(
                "expected a publish_material payload".to_string(),
            ));
        };
        ctx.ensure_not_cancelled()?;

        let material = self.study.publish_material(&payload.material_id)?;
        info!(job_id = %ctx.job_id(), material_id = %material.id, "Material published");

        Ok(Some(json!({
            "material_id": material.id,
            "published_at": material.published_at,
        })))
    }
}
