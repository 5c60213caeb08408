//! Error types for the document module.

use std::path::PathBuf;
use thiserror::Error;

use crate::process::ToolError;
use crate::usage::CostLimitExceeded;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported document format: {extension}")]
    UnsupportedFormat { extension: String },

    #[error("Document not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    #[error("{} not found", path.display())]
    ToolNotFound { path: PathBuf },

    #[error("PDF conversion failed: {stderr}")]
    ConversionFailed { stderr: String },

    #[error("Page rasterization failed: {stderr}")]
    RasterizeFailed { stderr: String },

    #[error("Document has no pages")]
    NoPages,

    #[error("Document processing cancelled")]
    Cancelled,

    #[error(transparent)]
    CostLimit(#[from] CostLimitExceeded),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DocumentError {
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

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
