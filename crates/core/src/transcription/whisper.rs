//! OpenAI-compatible `/audio/transcriptions` backend.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use super::error::TranscriptionError;
use super::traits::SpeechToText;
use super::types::{RawSegment, SttOutput};
use crate::cancel::CancelToken;
use crate::provider::{ChatUsage, ProviderError};

pub struct WhisperApiTranscriber {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperApiTranscriber {
    pub fn new(
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            api_key,
            model: model.into(),
        }
    }

    async fn send(
        &self,
        audio: &Path,
        language: &str,
    ) -> Result<WhisperResponse, TranscriptionError> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("whisper".to_string()))?;

        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .text("language", language.to_string());

        let url = format!(
            "{}/audio/transcriptions",
            self.api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api { status, message }.into());
        }

        response
            .json()
            .await
            .map_err(|e| TranscriptionError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl SpeechToText for WhisperApiTranscriber {
    fn name(&self) -> &str {
        "whisper_api"
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language: &str,
        cancel: &CancelToken,
    ) -> Result<SttOutput, TranscriptionError> {
        let response = cancel
            .run_until_cancelled(self.send(audio, language))
            .await
            .ok_or(TranscriptionError::Cancelled)??;

        let segments = response.into_segments();
        debug!(audio = %audio.display(), segments = segments.len(), "Whisper transcription finished");
        Ok(SttOutput {
            segments,
            usage: ChatUsage::default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    start: f64,
    end: f64,
    text: String,
    avg_logprob: Option<f64>,
}

impl WhisperResponse {
    fn into_segments(self) -> Vec<RawSegment> {
        if self.segments.is_empty() {
            // Some compatible servers only return the full text.
            let text = self.text.trim();
            if text.is_empty() {
                return Vec::new();
            }
            return vec![RawSegment {
                start_ms: 0,
                end_ms: seconds_to_ms(self.duration.unwrap_or(0.0)),
                text: text.to_string(),
                confidence: None,
                speaker: None,
            }];
        }

        self.segments
            .into_iter()
            .filter(|s| !s.text.trim().is_empty())
            .map(|s| RawSegment {
                start_ms: seconds_to_ms(s.start),
                end_ms: seconds_to_ms(s.end.max(s.start)),
                text: s.text.trim().to_string(),
                confidence: s.avg_logprob.map(|lp| lp.exp().clamp(0.0, 1.0)),
                speaker: None,
            })
            .collect()
    }
}

pub(crate) fn seconds_to_ms(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}
