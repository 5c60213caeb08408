//! Speech-to-text through an audio-capable chat model.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use super::error::TranscriptionError;
use super::traits::{audio_format, SpeechToText};
use super::types::{RawSegment, SttOutput};
use super::whisper::seconds_to_ms;
use crate::cancel::CancelToken;
use crate::provider::{complete, ChatRequest, ContentPart, Message, Provider, Role};

const TRANSCRIBE_PROMPT: &str = "You are a transcription engine. Transcribe the attached lecture audio verbatim. \
Respond with JSON only, no commentary, in the form \
{\"segments\": [{\"start\": <seconds>, \"end\": <seconds>, \"text\": \"...\", \"speaker\": \"optional label\"}]}. \
Timestamps are seconds from the start of this audio file.";

pub struct ChatModelTranscriber {
    provider: Arc<dyn Provider>,
    model: String,
}

impl ChatModelTranscriber {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SpeechToText for ChatModelTranscriber {
    fn name(&self) -> &str {
        "chat"
    }

    async fn transcribe(
        &self,
        audio: &Path,
        language: &str,
        cancel: &CancelToken,
    ) -> Result<SttOutput, TranscriptionError> {
        let bytes = tokio::fs::read(audio).await?;
        let request = ChatRequest::new(self.model.clone())
            .with_message(Message::system(TRANSCRIBE_PROMPT))
            .with_message(Message::new(
                Role::User,
                vec![
                    ContentPart::text(format!("Spoken language: {}", language)),
                    ContentPart::audio_bytes(audio_format(audio), &bytes),
                ],
            ))
            .with_temperature(0.0);

        let completion = complete(self.provider.as_ref(), request, cancel).await?;
        let segments = parse_segments(&completion.text).map_err(|e| match e {
            TranscriptionError::Malformed(reason) => TranscriptionError::MalformedReply {
                reason,
                usage: completion.usage.clone(),
            },
            e => e,
        })?;
        debug!(audio = %audio.display(), segments = segments.len(), "Chat-model transcription finished");
        Ok(SttOutput {
            segments,
            usage: completion.usage,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SegmentReply {
    Wrapped { segments: Vec<ReplySegment> },
    Bare(Vec<ReplySegment>),
}

#[derive(Debug, Deserialize)]
struct ReplySegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    speaker: Option<String>,
}

/// Parses the model's JSON reply, tolerating a markdown code fence around it.
fn parse_segments(reply: &str) -> Result<Vec<RawSegment>, TranscriptionError> {
    let body = strip_code_fence(reply);
    let parsed: SegmentReply = serde_json::from_str(body)
        .map_err(|e| TranscriptionError::Malformed(format!("{}: {}", e, reply)))?;
    let segments = match parsed {
        SegmentReply::Wrapped { segments } | SegmentReply::Bare(segments) => segments,
    };

    let mut out: Vec<RawSegment> = segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| RawSegment {
            start_ms: seconds_to_ms(s.start),
            end_ms: seconds_to_ms(s.end.max(s.start)),
            text: s.text.trim().to_string(),
            confidence: None,
            speaker: s.speaker.filter(|sp| !sp.trim().is_empty()),
        })
        .collect();
    out.sort_by_key(|s| s.start_ms);
    Ok(out)
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChatUsage;
    use crate::testing::MockProvider;

    #[test]
    fn test_parse_wrapped_and_fenced_reply() {
        let reply = "```json\n{\"segments\": [\
            {\"start\": 3.0, \"end\": 4.5, \"text\": \"second\", \"speaker\": \"A\"},\
            {\"start\": 0.0, \"end\": 3.0, \"text\": \"first\", \"speaker\": \"\"}]}\n```";
        let segments = parse_segments(reply).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first");
        assert_eq!(segments[0].speaker, None);
        assert_eq!(segments[1].start_ms, 3000);
        assert_eq!(segments[1].end_ms, 4500);
        assert_eq!(segments[1].speaker.as_deref(), Some("A"));
    }

    #[test]
    fn test_parse_bare_array() {
        let segments = parse_segments(r#"[{"start": 1, "end": 2, "text": "hi"}]"#).unwrap();
        assert_eq!(segments[0].start_ms, 1000);
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(matches!(
            parse_segments("Sorry, I cannot transcribe this."),
            Err(TranscriptionError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_transcribe_sends_audio_part_and_returns_usage() {
        let dir = tempfile::TempDir::new().unwrap();
        let audio = dir.path().join("lecture.wav");
        std::fs::write(&audio, b"RIFF").unwrap();

        let provider = Arc::new(MockProvider::named("openrouter"));
        provider
            .push_reply(r#"{"segments": [{"start": 0, "end": 1.5, "text": "Hello"}]}"#)
            .await;
        provider
            .set_usage(ChatUsage {
                input_tokens: 100,
                output_tokens: 20,
                cost: Some(0.01),
            })
            .await;

        let stt = ChatModelTranscriber::new(provider.clone(), "openai/gpt-4o-audio-preview");
        let output = stt
            .transcribe(&audio, "de", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(output.segments.len(), 1);
        assert_eq!(output.usage.cost, Some(0.01));

        let requests = provider.requests().await;
        let user = &requests[0].messages[1];
        assert!(matches!(
            &user.content[1],
            ContentPart::Audio { format, .. } if format == "wav"
        ));
        assert!(user.text().contains("de"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_still_reports_usage() {
        let dir = tempfile::TempDir::new().unwrap();
        let audio = dir.path().join("lecture.mp3");
        std::fs::write(&audio, b"ID3").unwrap();

        let provider = Arc::new(MockProvider::named("openrouter"));
        provider
            .push_reply("I'm sorry, the audio is too quiet to transcribe.")
            .await;
        provider
            .set_usage(ChatUsage {
                input_tokens: 900,
                output_tokens: 12,
                cost: Some(0.03),
            })
            .await;

        let stt = ChatModelTranscriber::new(provider, "openai/gpt-4o-audio-preview");
        let err = stt
            .transcribe(&audio, "en", &CancelToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Malformed transcription response"));
        let usage = err.billed_usage().unwrap();
        assert_eq!(usage.input_tokens, 900);
        assert_eq!(usage.cost, Some(0.03));
    }
}
