//! Media types.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Kind of a lecture media file, decided from its extension at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }

    /// Guesses the kind from a file extension. Unknown extensions are treated as video
    /// so the audio track is always extracted before transcription.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "mp3" | "wav" | "m4a" | "aac" | "flac" | "ogg" | "opus" | "wma" => MediaKind::Audio,
            _ => MediaKind::Video,
        }
    }
}

/// Information about a probed media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub duration_ms: u64,
    /// First entry of ffprobe's `format_name` ("mov", "mp3", ...).
    pub format: String,
    pub has_audio: bool,
    pub has_video: bool,
}
