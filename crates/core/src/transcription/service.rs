//! Stitches per-file transcripts into one lecture timeline.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::error::TranscriptionError;
use super::traits::SpeechToText;
use super::types::{
    overall_confidence, MediaDuration, MediaFile, StitchedSegment, TranscriptionOutput,
};
use crate::cancel::CancelToken;
use crate::media::{MediaError, MediaKind, MediaProbe};
use crate::progress::ProgressReporter;
use crate::usage::UsageRecorder;

pub struct TranscriptionService {
    media: Arc<dyn MediaProbe>,
    stt: Arc<dyn SpeechToText>,
}

impl TranscriptionService {
    pub fn new(media: Arc<dyn MediaProbe>, stt: Arc<dyn SpeechToText>) -> Self {
        Self { media, stt }
    }

    /// Transcribes `files` in sequence order onto a single timeline.
    ///
    /// Each file is transcribed alone. Its segments are shifted by the summed
    /// probed durations of every earlier file. Any probe, extraction, or
    /// speech-to-text failure fails the whole run. Usage goes to `usage` as
    /// soon as each file is transcribed, and a refusal from it stops the run.
    pub async fn transcribe_all(
        &self,
        files: &[MediaFile],
        language: &str,
        scratch: &Path,
        progress: &dyn ProgressReporter,
        usage: &dyn UsageRecorder,
        cancel: &CancelToken,
    ) -> Result<TranscriptionOutput, TranscriptionError> {
        if files.is_empty() {
            return Err(TranscriptionError::NoMedia);
        }

        let mut ordered: Vec<&MediaFile> = files.iter().collect();
        ordered.sort_by_key(|f| f.sequence_order);
        let total = ordered.len();

        let mut offset_ms: u64 = 0;
        let mut segments = Vec::new();
        let mut durations = Vec::with_capacity(total);

        progress.report(0, &format!("Transcribing {} media file(s)", total));

        for (index, file) in ordered.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(TranscriptionError::Cancelled);
            }

            let info = self
                .media
                .probe(&file.path, cancel)
                .await
                .map_err(|source| media_error(file, source, true))?;

            let audio_path = match file.kind {
                MediaKind::Audio => file.path.clone(),
                MediaKind::Video => {
                    let out = scratch.join(format!("{:03}-{}.mp3", index, file.id));
                    self.media
                        .extract_audio(&file.path, &out, cancel)
                        .await
                        .map_err(|source| media_error(file, source, false))?;
                    out
                }
            };

            let output = match self.stt.transcribe(&audio_path, language, cancel).await {
                Ok(output) => output,
                Err(e) => {
                    if let Some(billed) = e.billed_usage() {
                        // The file already failed; its error wins over the ceiling.
                        let _ = usage.record(billed);
                    }
                    return Err(e);
                }
            };
            usage.record(&output.usage)?;
            let mut file_segments = output.segments;
            file_segments.sort_by_key(|s| s.start_ms);

            debug!(
                media_id = %file.id,
                file_index = index,
                offset_ms,
                duration_ms = info.duration_ms,
                segments = file_segments.len(),
                "Transcribed media file"
            );

            segments.extend(file_segments.into_iter().map(|s| StitchedSegment {
                media_id: file.id.clone(),
                start_ms: s.start_ms + offset_ms,
                end_ms: s.end_ms + offset_ms,
                original_start_ms: s.start_ms,
                original_end_ms: s.end_ms,
                text: s.text,
                confidence: s.confidence,
                speaker: s.speaker,
            }));

            // The probed duration, not the last segment end, so trailing silence counts.
            offset_ms += info.duration_ms;
            durations.push(MediaDuration {
                media_id: file.id.clone(),
                duration_ms: info.duration_ms,
            });

            let percent = ((index + 1) * 100 / total) as u8;
            progress.report(
                percent,
                &format!("Transcribed file {} of {}", index + 1, total),
            );
        }

        let confidence = overall_confidence(&segments);
        info!(
            files = total,
            segments = segments.len(),
            total_duration_ms = offset_ms,
            "Transcription stitched"
        );

        Ok(TranscriptionOutput {
            segments,
            durations,
            total_duration_ms: offset_ms,
            confidence,
        })
    }
}

fn media_error(file: &MediaFile, source: MediaError, probing: bool) -> TranscriptionError {
    if matches!(source, MediaError::Cancelled) {
        return TranscriptionError::Cancelled;
    }
    let media_id = file.id.clone();
    if probing {
        TranscriptionError::Probe { media_id, source }
    } else {
        TranscriptionError::Extract { media_id, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use crate::testing::{MockMediaProbe, MockProvider, MockSpeechToText};
    use crate::transcription::ChatModelTranscriber;
    use crate::provider::ChatUsage;
    use crate::transcription::RawSegment;
    use crate::usage::{CostLimitExceeded, UsageTally};
    use std::path::PathBuf;

    fn file(id: &str, order: i64, kind: MediaKind) -> MediaFile {
        let ext = match kind {
            MediaKind::Audio => "mp3",
            MediaKind::Video => "mp4",
        };
        MediaFile {
            id: id.to_string(),
            path: PathBuf::from(format!("/media/{}.{}", id, ext)),
            kind,
            sequence_order: order,
        }
    }

    fn raw(start_ms: u64, end_ms: u64, text: &str) -> RawSegment {
        RawSegment {
            start_ms,
            end_ms,
            text: text.to_string(),
            confidence: Some(0.9),
            speaker: None,
        }
    }

    #[tokio::test]
    async fn test_second_file_is_offset_by_first_duration() {
        let media = Arc::new(MockMediaProbe::new());
        media.set_duration("/media/a.mp3", 60_000).await;
        media.set_duration("/media/b.mp3", 45_000).await;

        let stt = Arc::new(MockSpeechToText::new());
        stt.set_segments("/media/a.mp3", vec![raw(0, 5000, "first")]).await;
        stt.set_segments("/media/b.mp3", vec![raw(0, 3000, "second")]).await;

        let service = TranscriptionService::new(media, stt);
        let files = vec![
            file("b", 2, MediaKind::Audio),
            file("a", 1, MediaKind::Audio),
        ];
        let dir = tempfile::TempDir::new().unwrap();
        let output = service
            .transcribe_all(
                &files,
                "en",
                dir.path(),
                &NoopProgress,
                &UsageTally::new(),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(output.segments.len(), 2);
        assert_eq!((output.segments[0].start_ms, output.segments[0].end_ms), (0, 5000));
        assert_eq!(output.segments[1].media_id, "b");
        assert_eq!((output.segments[1].start_ms, output.segments[1].end_ms), (60_000, 63_000));
        assert_eq!(output.segments[1].original_start_ms, 0);
        assert_eq!(output.total_duration_ms, 105_000);
    }

    #[tokio::test]
    async fn test_probe_failure_fails_everything() {
        let media = Arc::new(MockMediaProbe::new());
        media.set_duration("/media/a.mp3", 60_000).await;
        media.fail_probe("/media/b.mp3", "moov atom not found").await;

        let service = TranscriptionService::new(media, Arc::new(MockSpeechToText::new()));
        let files = vec![file("a", 1, MediaKind::Audio), file("b", 2, MediaKind::Audio)];
        let dir = tempfile::TempDir::new().unwrap();
        let err = service
            .transcribe_all(
                &files,
                "en",
                dir.path(),
                &NoopProgress,
                &UsageTally::new(),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            TranscriptionError::Probe { media_id, source } => {
                assert_eq!(media_id, "b");
                assert!(source.to_string().contains("moov atom not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_video_is_extracted_into_scratch() {
        let media = Arc::new(MockMediaProbe::new());
        media.set_duration("/media/v.mp4", 10_000).await;
        let stt = Arc::new(MockSpeechToText::new());

        let service = TranscriptionService::new(media.clone(), stt.clone());
        let dir = tempfile::TempDir::new().unwrap();
        service
            .transcribe_all(
                &[file("v", 1, MediaKind::Video)],
                "en",
                dir.path(),
                &NoopProgress,
                &UsageTally::new(),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        let extracted = media.extractions().await;
        assert_eq!(extracted.len(), 1);
        assert!(extracted[0].starts_with(dir.path()));
        assert_eq!(stt.transcribed().await, vec![extracted[0].clone()]);
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected() {
        let service = TranscriptionService::new(
            Arc::new(MockMediaProbe::new()),
            Arc::new(MockSpeechToText::new()),
        );
        let err = service
            .transcribe_all(
                &[],
                "en",
                Path::new("/tmp"),
                &NoopProgress,
                &UsageTally::new(),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::NoMedia));
    }

    #[tokio::test]
    async fn test_usage_of_finished_files_survives_later_failure() {
        let media = Arc::new(MockMediaProbe::new());
        media.set_duration("/media/a.mp3", 60_000).await;
        media.fail_probe("/media/b.mp3", "Invalid data found").await;
        let stt = Arc::new(MockSpeechToText::new());
        stt.set_usage(ChatUsage {
            input_tokens: 0,
            output_tokens: 40,
            cost: Some(0.25),
        })
        .await;

        let service = TranscriptionService::new(media, stt.clone());
        let files = vec![file("a", 1, MediaKind::Audio), file("b", 2, MediaKind::Audio)];
        let dir = tempfile::TempDir::new().unwrap();
        let tally = UsageTally::new();
        let err = service
            .transcribe_all(
                &files,
                "en",
                dir.path(),
                &NoopProgress,
                &tally,
                &CancelToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::Probe { .. }));
        assert_eq!(stt.transcribed().await.len(), 1);
        assert_eq!(tally.total().cost, Some(0.25));
        assert_eq!(tally.total().output_tokens, 40);
    }

    struct Ceiling(f64, UsageTally);

    impl UsageRecorder for Ceiling {
        fn record(&self, usage: &ChatUsage) -> Result<(), CostLimitExceeded> {
            self.1.record(usage)?;
            let spent = self.1.total().cost.unwrap_or(0.0);
            if spent > self.0 {
                return Err(CostLimitExceeded {
                    spent,
                    limit: self.0,
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ceiling_stops_before_next_file() {
        let media = Arc::new(MockMediaProbe::new());
        for path in ["/media/a.mp3", "/media/b.mp3", "/media/c.mp3"] {
            media.set_duration(path, 10_000).await;
        }
        let stt = Arc::new(MockSpeechToText::new());
        stt.set_usage(ChatUsage {
            input_tokens: 0,
            output_tokens: 10,
            cost: Some(0.25),
        })
        .await;

        let service = TranscriptionService::new(media, stt.clone());
        let files = vec![
            file("a", 1, MediaKind::Audio),
            file("b", 2, MediaKind::Audio),
            file("c", 3, MediaKind::Audio),
        ];
        let dir = tempfile::TempDir::new().unwrap();
        let err = service
            .transcribe_all(
                &files,
                "en",
                dir.path(),
                &NoopProgress,
                &Ceiling(0.10, UsageTally::new()),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::CostLimit(_)));
        assert_eq!(stt.transcribed().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_still_billed() {
        let dir = tempfile::TempDir::new().unwrap();
        let audio = dir.path().join("week2.mp3");
        std::fs::write(&audio, b"ID3").unwrap();

        let media = Arc::new(MockMediaProbe::new());
        media.set_duration(&audio, 30_000).await;
        let provider = Arc::new(MockProvider::named("openrouter"));
        provider.push_reply("Here is the transcript you asked for:").await;
        provider
            .set_usage(ChatUsage {
                input_tokens: 2400,
                output_tokens: 9,
                cost: Some(0.02),
            })
            .await;

        let stt = Arc::new(ChatModelTranscriber::new(provider, "gpt-4o-audio-preview"));
        let service = TranscriptionService::new(media, stt);
        let files = vec![MediaFile {
            id: "w2".to_string(),
            path: audio,
            kind: MediaKind::Audio,
            sequence_order: 1,
        }];
        let tally = UsageTally::new();
        let err = service
            .transcribe_all(
                &files,
                "en",
                dir.path(),
                &NoopProgress,
                &tally,
                &CancelToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TranscriptionError::MalformedReply { .. }));
        assert_eq!(tally.total().input_tokens, 2400);
        assert_eq!(tally.total().cost, Some(0.02));
    }
}
