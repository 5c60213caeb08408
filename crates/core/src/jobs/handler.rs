//! Handler contract and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use super::context::JobContext;
use super::store::JobStoreError;
use super::types::{JobPayload, JobType};
use crate::document::DocumentError;
use crate::media::MediaError;
use crate::provider::ProviderError;
use crate::study::StudyStoreError;
use crate::transcription::TranscriptionError;
use crate::usage::CostLimitExceeded;

/// Errors a handler can end a job with.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid payload: {0}")]
    Payload(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    CostLimit(#[from] CostLimitExceeded),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transcription(TranscriptionError),

    #[error(transparent)]
    Document(DocumentError),

    #[error(transparent)]
    Study(#[from] StudyStoreError),

    #[error(transparent)]
    Jobs(#[from] JobStoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// True when the error only reports that the job's token fired.
    pub fn is_cancellation(&self) -> bool {
        match self {
            HandlerError::Cancelled => true,
            HandlerError::Provider(e) => e.is_cancelled(),
            HandlerError::Media(MediaError::Cancelled) => true,
            HandlerError::Transcription(e) => e.is_cancelled(),
            HandlerError::Document(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

// A pipeline stopped by the ceiling surfaces as `CostLimit` whatever layer it came from.
impl From<TranscriptionError> for HandlerError {
    fn from(e: TranscriptionError) -> Self {
        match e {
            TranscriptionError::CostLimit(e) => HandlerError::CostLimit(e),
            e => HandlerError::Transcription(e),
        }
    }
}

impl From<DocumentError> for HandlerError {
    fn from(e: DocumentError) -> Self {
        match e {
            DocumentError::CostLimit(e) => HandlerError::CostLimit(e),
            e => HandlerError::Document(e),
        }
    }
}

/// Work bound to one job type.
///
/// A handler reports progress and usage through the context and must check
/// the context's cancel token at its suspension points.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    /// Runs the job. The returned value is stored as the job's result.
    async fn handle(
        &self,
        ctx: &JobContext,
        payload: JobPayload,
    ) -> Result<Option<Value>, HandlerError>;
}

#[derive(Debug, Error)]
#[error("a handler is already registered for {0}")]
pub struct DuplicateHandler(pub JobType);

/// Job type to handler lookup, fixed before the engine starts.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) -> Result<(), DuplicateHandler> {
        let job_type = handler.job_type();
        if self.handlers.contains_key(&job_type) {
            return Err(DuplicateHandler(job_type));
        }
        self.handlers.insert(job_type, handler);
        Ok(())
    }

    pub fn get(&self, job_type: JobType) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&job_type).cloned()
    }

    pub fn job_types(&self) -> Vec<JobType> {
        let mut types: Vec<JobType> = self.handlers.keys().copied().collect();
        types.sort_by_key(|t| t.as_str());
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop(JobType);

    #[async_trait]
    impl JobHandler for Noop {
        fn job_type(&self) -> JobType {
            self.0
        }

        async fn handle(
            &self,
            _ctx: &JobContext,
            _payload: JobPayload,
        ) -> Result<Option<Value>, HandlerError> {
            Ok(None)
        }
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = HandlerRegistry::new();
        registry
            .register(Arc::new(Noop(JobType::PublishMaterial)))
            .unwrap();
        registry
            .register(Arc::new(Noop(JobType::BuildMaterial)))
            .unwrap();

        let err = registry
            .register(Arc::new(Noop(JobType::PublishMaterial)))
            .unwrap_err();
        assert_eq!(err.0, JobType::PublishMaterial);
        assert_eq!(
            registry.job_types(),
            vec![JobType::BuildMaterial, JobType::PublishMaterial]
        );
        assert!(registry.get(JobType::TranscribeMedia).is_none());
    }

    #[test]
    fn test_cancellation_is_recognised_through_wrappers() {
        assert!(HandlerError::Cancelled.is_cancellation());
        assert!(HandlerError::Provider(ProviderError::Cancelled).is_cancellation());
        assert!(HandlerError::Transcription(TranscriptionError::Cancelled).is_cancellation());
        assert!(!HandlerError::Provider(ProviderError::Http("reset".into())).is_cancellation());
        assert!(!HandlerError::CostLimit(CostLimitExceeded {
            spent: 2.0,
            limit: 1.0
        })
        .is_cancellation());
    }

    #[test]
    fn test_pipeline_cost_limit_is_lifted() {
        let exceeded = CostLimitExceeded {
            spent: 0.25,
            limit: 0.1,
        };
        let from_ocr = HandlerError::from(DocumentError::CostLimit(exceeded.clone()));
        assert!(matches!(from_ocr, HandlerError::CostLimit(_)));
        let from_stt = HandlerError::from(TranscriptionError::CostLimit(exceeded));
        assert_eq!(
            from_stt.to_string(),
            "cost limit exceeded: spent $0.2500, limit $0.1000"
        );
    }
}
