//! Document types.

use std::path::{Path, PathBuf};

use super::error::DocumentError;

const OFFICE_EXTENSIONS: &[&str] = &[
    "doc", "docx", "odt", "rtf", "ppt", "pptx", "odp", "xls", "xlsx", "ods",
];

/// Input format of a reference document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    /// Converted to PDF first. Holds the lowercased extension.
    Office(String),
}

impl DocumentFormat {
    /// Detects the format from the file extension.
    pub fn detect(path: &Path) -> Result<Self, DocumentError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if ext == "pdf" {
            Ok(DocumentFormat::Pdf)
        } else if OFFICE_EXTENSIONS.contains(&ext.as_str()) {
            Ok(DocumentFormat::Office(ext))
        } else {
            Err(DocumentError::UnsupportedFormat {
                extension: if ext.is_empty() { "(none)".to_string() } else { ext },
            })
        }
    }

    pub fn needs_conversion(&self) -> bool {
        matches!(self, DocumentFormat::Office(_))
    }
}

/// Extracted text of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// 1-based, contiguous.
    pub page_number: u32,
    /// Rendered page image inside the job's scratch directory.
    pub image_path: PathBuf,
    pub text: String,
    pub ocr_failed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutput {
    pub pages: Vec<PageText>,
}

impl DocumentOutput {
    pub fn failed_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| p.ocr_failed)
            .map(|p| p.page_number)
            .collect()
    }
}

/// Text stored for a page whose OCR call failed.
pub fn ocr_failure_marker(page_number: u32, reason: &str) -> String {
    format!("[OCR failed for page {}: {}]", page_number, reason)
}
