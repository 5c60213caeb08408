//! Mock document tools for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::cancel::CancelToken;
use crate::document::{DocumentError, DocumentTools};

/// Mock implementation of the DocumentTools trait.
///
/// Conversion writes an empty PDF next to the requested output; rendering
/// writes `pages` placeholder `page-N.png` files.
#[derive(Debug)]
pub struct MockDocumentTools {
    pages: usize,
    convert_calls: AtomicUsize,
    rasterize_calls: AtomicUsize,
}

impl MockDocumentTools {
    pub fn new(pages: usize) -> Self {
        Self {
            pages,
            convert_calls: AtomicUsize::new(0),
            rasterize_calls: AtomicUsize::new(0),
        }
    }

    pub fn convert_calls(&self) -> usize {
        self.convert_calls.load(Ordering::SeqCst)
    }

    pub fn rasterize_calls(&self) -> usize {
        self.rasterize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentTools for MockDocumentTools {
    async fn convert_to_pdf(
        &self,
        input: &Path,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf, DocumentError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(DocumentError::Cancelled);
        }
        tokio::fs::create_dir_all(out_dir).await?;
        let stem = input.file_stem().unwrap_or_default();
        let pdf = out_dir.join(stem).with_extension("pdf");
        tokio::fs::write(&pdf, b"%PDF-1.7").await?;
        Ok(pdf)
    }

    async fn rasterize(
        &self,
        _pdf: &Path,
        out_dir: &Path,
        _dpi: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<PathBuf>, DocumentError> {
        self.rasterize_calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(DocumentError::Cancelled);
        }
        tokio::fs::create_dir_all(out_dir).await?;
        let mut pages = Vec::with_capacity(self.pages);
        for n in 1..=self.pages {
            let page = out_dir.join(format!("page-{}.png", n));
            tokio::fs::write(&page, format!("png page {}", n)).await?;
            pages.push(page);
        }
        Ok(pages)
    }
}
