//! Mock media probe and speech-to-text backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::cancel::CancelToken;
use crate::media::{MediaError, MediaInfo, MediaKind, MediaProbe};
use crate::provider::ChatUsage;
use crate::transcription::{RawSegment, SpeechToText, SttOutput, TranscriptionError};

/// Mock implementation of the MediaProbe trait.
///
/// Durations are configured per path; probing an unconfigured path fails
/// with `InputNotFound`. Audio extraction writes a small placeholder file
/// and records the output path.
#[derive(Debug, Default)]
pub struct MockMediaProbe {
    durations: Arc<RwLock<HashMap<PathBuf, u64>>>,
    probe_failures: Arc<RwLock<HashMap<PathBuf, String>>>,
    extractions: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockMediaProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_duration(&self, path: impl AsRef<Path>, duration_ms: u64) {
        self.durations
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), duration_ms);
    }

    /// Make probing `path` fail with the given ffprobe stderr.
    pub async fn fail_probe(&self, path: impl AsRef<Path>, stderr: &str) {
        self.probe_failures
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), stderr.to_string());
    }

    /// Output paths of every audio extraction, in order.
    pub async fn extractions(&self) -> Vec<PathBuf> {
        self.extractions.read().await.clone()
    }
}

#[async_trait]
impl MediaProbe for MockMediaProbe {
    async fn probe(&self, path: &Path, cancel: &CancelToken) -> Result<MediaInfo, MediaError> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        if let Some(stderr) = self.probe_failures.read().await.get(path) {
            return Err(MediaError::ProbeFailed {
                path: path.to_path_buf(),
                stderr: stderr.clone(),
            });
        }
        let duration_ms = self
            .durations
            .read()
            .await
            .get(path)
            .copied()
            .ok_or_else(|| MediaError::InputNotFound {
                path: path.to_path_buf(),
            })?;

        let is_video = MediaKind::from_path(path) == MediaKind::Video;
        Ok(MediaInfo {
            duration_ms,
            format: if is_video { "mov" } else { "mp3" }.to_string(),
            has_audio: true,
            has_video: is_video,
        })
    }

    async fn extract_audio(
        &self,
        _input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), MediaError> {
        if cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"ID3").await?;
        self.extractions.write().await.push(output.to_path_buf());
        Ok(())
    }

    async fn validate(&self) -> Result<(), MediaError> {
        Ok(())
    }
}

/// Mock implementation of the SpeechToText trait.
///
/// Segments are configured per audio path; unconfigured paths yield no
/// segments, like a silent recording.
#[derive(Debug, Default)]
pub struct MockSpeechToText {
    segments: Arc<RwLock<HashMap<PathBuf, Vec<RawSegment>>>>,
    failures: Arc<RwLock<HashMap<PathBuf, String>>>,
    transcribed: Arc<RwLock<Vec<PathBuf>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    usage: Arc<RwLock<ChatUsage>>,
}

impl MockSpeechToText {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_segments(&self, path: impl AsRef<Path>, segments: Vec<RawSegment>) {
        self.segments
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), segments);
    }

    /// Make transcribing `path` fail with a malformed-response error.
    pub async fn fail(&self, path: impl AsRef<Path>, message: &str) {
        self.failures
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), message.to_string());
    }

    /// Simulated time per file. Cancellation interrupts the wait.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Usage reported for every file.
    pub async fn set_usage(&self, usage: ChatUsage) {
        *self.usage.write().await = usage;
    }

    /// Audio paths transcribed so far, in order.
    pub async fn transcribed(&self) -> Vec<PathBuf> {
        self.transcribed.read().await.clone()
    }
}

#[async_trait]
impl SpeechToText for MockSpeechToText {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transcribe(
        &self,
        audio: &Path,
        _language: &str,
        cancel: &CancelToken,
    ) -> Result<SttOutput, TranscriptionError> {
        self.transcribed.write().await.push(audio.to_path_buf());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            cancel
                .run_until_cancelled(tokio::time::sleep(delay))
                .await
                .ok_or(TranscriptionError::Cancelled)?;
        }

        if let Some(message) = self.failures.read().await.get(audio) {
            return Err(TranscriptionError::Malformed(message.clone()));
        }

        Ok(SttOutput {
            segments: self
                .segments
                .read()
                .await
                .get(audio)
                .cloned()
                .unwrap_or_default(),
            usage: self.usage.read().await.clone(),
        })
    }
}
