//! Trait definitions for the media module.

use async_trait::async_trait;
use std::path::Path;

use super::error::MediaError;
use super::types::MediaInfo;
use crate::cancel::CancelToken;

#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Probes a media file for its duration and streams.
    async fn probe(&self, path: &Path, cancel: &CancelToken) -> Result<MediaInfo, MediaError>;

    /// Writes the audio track of `input` to `output` as mono 16 kHz MP3.
    async fn extract_audio(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<(), MediaError>;

    /// Checks that the underlying tools are installed.
    async fn validate(&self) -> Result<(), MediaError>;
}
