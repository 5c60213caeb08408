//! Reference document ingestion.
//!
//! Office documents are converted to PDF, every PDF page is rendered to PNG,
//! and each page image is OCR'd by a vision model through the provider layer.
//! Page OCR is best-effort: a failed page keeps a visible marker instead of
//! failing the document.

mod error;
mod processor;
mod tools;
mod types;

pub use error::DocumentError;
pub use processor::DocumentProcessor;
pub use tools::{DocumentTools, ExternalDocumentTools};
pub use types::{ocr_failure_marker, DocumentFormat, DocumentOutput, PageText};
