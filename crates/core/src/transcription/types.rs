//! Transcription types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::media::MediaKind;
use crate::provider::ChatUsage;

/// One media file of a lecture, in the lecture's sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: String,
    pub path: PathBuf,
    pub kind: MediaKind,
    /// Authoritative playback order, ascending.
    pub sequence_order: i64,
}

/// A segment as reported by speech-to-text, relative to its own file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub confidence: Option<f64>,
    pub speaker: Option<String>,
}

/// A segment placed on the lecture's unified timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StitchedSegment {
    pub media_id: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub original_start_ms: u64,
    pub original_end_ms: u64,
    pub text: String,
    pub confidence: Option<f64>,
    pub speaker: Option<String>,
}

/// Probed duration of one media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDuration {
    pub media_id: String,
    pub duration_ms: u64,
}

/// Result of speech-to-text on a single file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SttOutput {
    pub segments: Vec<RawSegment>,
    pub usage: ChatUsage,
}

/// Result of transcribing every file of a lecture.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOutput {
    pub segments: Vec<StitchedSegment>,
    pub durations: Vec<MediaDuration>,
    pub total_duration_ms: u64,
    pub confidence: Option<f64>,
}

/// Duration-weighted mean of segment confidences.
///
/// Segments without a confidence are skipped. When every scored segment has
/// zero length the plain mean is used. `None` when nothing is scored.
pub fn overall_confidence(segments: &[StitchedSegment]) -> Option<f64> {
    let scored: Vec<(f64, f64)> = segments
        .iter()
        .filter_map(|s| {
            s.confidence
                .map(|c| (c, s.end_ms.saturating_sub(s.start_ms) as f64))
        })
        .collect();
    if scored.is_empty() {
        return None;
    }

    let total_weight: f64 = scored.iter().map(|(_, w)| w).sum();
    if total_weight > 0.0 {
        Some(scored.iter().map(|(c, w)| c * w).sum::<f64>() / total_weight)
    } else {
        Some(scored.iter().map(|(c, _)| c).sum::<f64>() / scored.len() as f64)
    }
}
