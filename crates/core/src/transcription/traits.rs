//! Speech-to-text backend trait.

use async_trait::async_trait;
use std::path::Path;

use super::error::TranscriptionError;
use super::types::SttOutput;
use crate::cancel::CancelToken;

/// Transcribes a single audio file in isolation.
///
/// Segment offsets are relative to the start of `audio`.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(
        &self,
        audio: &Path,
        language: &str,
        cancel: &CancelToken,
    ) -> Result<SttOutput, TranscriptionError>;
}

/// Audio container format for an upload, from the file extension.
pub(crate) fn audio_format(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "mp3".to_string())
}
