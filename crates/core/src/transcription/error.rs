//! Error types for the transcription module.

use thiserror::Error;

use crate::media::MediaError;
use crate::provider::{ChatUsage, ProviderError};
use crate::usage::CostLimitExceeded;

#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("Lecture has no media to transcribe")]
    NoMedia,

    /// Probing failed, so no offset can be computed for later files.
    #[error("Probe failed for media {media_id}: {source}")]
    Probe {
        media_id: String,
        #[source]
        source: MediaError,
    },

    #[error("Audio extraction failed for media {media_id}: {source}")]
    Extract {
        media_id: String,
        #[source]
        source: MediaError,
    },

    #[error("Speech-to-text backend error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Malformed transcription response: {0}")]
    Malformed(String),

    /// The backend answered and billed, but the reply could not be parsed.
    #[error("Malformed transcription response: {reason}")]
    MalformedReply { reason: String, usage: ChatUsage },

    #[error(transparent)]
    CostLimit(#[from] CostLimitExceeded),

    #[error("Transcription cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscriptionError {
    /// Usage already spent on the failed call, if the backend reported any.
    pub fn billed_usage(&self) -> Option<&ChatUsage> {
        match self {
            Self::MalformedReply { usage, .. } => Some(usage),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Provider(e) => e.is_cancelled(),
            Self::Probe { source, .. } | Self::Extract { source, .. } => {
                matches!(source, MediaError::Cancelled)
            }
            _ => false,
        }
    }
}
