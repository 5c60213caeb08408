//! Error types for the media module.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::ToolError;

#[derive(Debug, Error)]
pub enum MediaError {
    /// ffprobe or ffmpeg binary not found.
    #[error("{} not found", path.display())]
    ToolNotFound { path: PathBuf },

    #[error("Input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// ffprobe exited non-zero or reported no duration.
    #[error("Failed to probe {}: {stderr}", path.display())]
    ProbeFailed { path: PathBuf, stderr: String },

    #[error("Audio extraction failed for {}: {stderr}", path.display())]
    ExtractFailed { path: PathBuf, stderr: String },

    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    #[error("Media operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Maps a tool failure, using `on_failure` for non-zero exits.
    pub(crate) fn from_tool(err: ToolError, on_failure: impl FnOnce(String) -> Self) -> Self {
        match err {
            ToolError::NotFound { path } => Self::ToolNotFound { path },
            ToolError::Failed { stderr, code, .. } => {
                if stderr.is_empty() {
                    on_failure(format!("exit code {:?}", code))
                } else {
                    on_failure(stderr)
                }
            }
            ToolError::Cancelled => Self::Cancelled,
            ToolError::Io(e) => Self::Io(e),
        }
    }
}
