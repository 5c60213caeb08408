//! External document tools: LibreOffice for conversion, poppler for rendering.

use async_trait::async_trait;
use regex_lite::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::DocumentError;
use crate::cancel::CancelToken;
use crate::process::{run_tool, tool_available};

#[async_trait]
pub trait DocumentTools: Send + Sync {
    /// Converts an office document to PDF inside `out_dir`, returning the PDF path.
    async fn convert_to_pdf(
        &self,
        input: &Path,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf, DocumentError>;

    /// Renders every page of `pdf` to PNG inside `out_dir`, in page order.
    async fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        dpi: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<PathBuf>, DocumentError>;
}

pub struct ExternalDocumentTools {
    soffice_path: PathBuf,
    pdftoppm_path: PathBuf,
}

impl Default for ExternalDocumentTools {
    fn default() -> Self {
        Self::new("soffice", "pdftoppm")
    }
}

impl ExternalDocumentTools {
    pub fn new(soffice_path: impl Into<PathBuf>, pdftoppm_path: impl Into<PathBuf>) -> Self {
        Self {
            soffice_path: soffice_path.into(),
            pdftoppm_path: pdftoppm_path.into(),
        }
    }

    pub async fn validate_converter(&self) -> Result<(), DocumentError> {
        tool_available(&self.soffice_path, "--version")
            .await
            .map_err(|e| {
                DocumentError::from_tool(e, |stderr| DocumentError::ConversionFailed { stderr })
            })
    }

    pub async fn validate_rasterizer(&self) -> Result<(), DocumentError> {
        tool_available(&self.pdftoppm_path, "-v")
            .await
            .map_err(|e| {
                DocumentError::from_tool(e, |stderr| DocumentError::RasterizeFailed { stderr })
            })
    }
}

#[async_trait]
impl DocumentTools for ExternalDocumentTools {
    async fn convert_to_pdf(
        &self,
        input: &Path,
        out_dir: &Path,
        cancel: &CancelToken,
    ) -> Result<PathBuf, DocumentError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let args: Vec<OsString> = vec![
            "--headless".into(),
            "--norestore".into(),
            "--convert-to".into(),
            "pdf".into(),
            "--outdir".into(),
            out_dir.as_os_str().to_os_string(),
            input.as_os_str().to_os_string(),
        ];
        run_tool(&self.soffice_path, args, cancel)
            .await
            .map_err(|e| {
                DocumentError::from_tool(e, |stderr| DocumentError::ConversionFailed { stderr })
            })?;

        // soffice keeps the input's stem and exits 0 even when it writes nothing.
        let stem = input.file_stem().unwrap_or_default();
        let pdf = out_dir.join(stem).with_extension("pdf");
        if !pdf.exists() {
            return Err(DocumentError::ConversionFailed {
                stderr: format!("no PDF produced for {}", input.display()),
            });
        }
        debug!(input = %input.display(), pdf = %pdf.display(), "Converted document to PDF");
        Ok(pdf)
    }

    async fn rasterize(
        &self,
        pdf: &Path,
        out_dir: &Path,
        dpi: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<PathBuf>, DocumentError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let args: Vec<OsString> = vec![
            "-png".into(),
            "-r".into(),
            dpi.to_string().into(),
            pdf.as_os_str().to_os_string(),
            out_dir.join("page").into_os_string(),
        ];
        run_tool(&self.pdftoppm_path, args, cancel)
            .await
            .map_err(|e| {
                DocumentError::from_tool(e, |stderr| DocumentError::RasterizeFailed { stderr })
            })?;

        let pages = collect_pages(out_dir)?;
        debug!(pdf = %pdf.display(), pages = pages.len(), dpi, "Rasterized PDF");
        Ok(pages)
    }
}

/// Finds `page-<n>.png` files and orders them by `n`.
///
/// pdftoppm zero-pads the number to the width of the page count, so a
/// lexical sort is not enough once padding differs between runs.
fn collect_pages(dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let pattern =
        Regex::new(r"^page-(\d+)\.png$").map_err(|e| DocumentError::RasterizeFailed {
            stderr: e.to_string(),
        })?;

    let mut pages: Vec<(u32, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(number) = pattern
            .captures(name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        {
            pages.push((number, entry.path()));
        }
    }
    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_pages_sorts_numerically() {
        let dir = tempfile::TempDir::new().unwrap();
        for name in ["page-10.png", "page-02.png", "page-1.png", "other.png", "page-3.ppm"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let pages = collect_pages(dir.path()).unwrap();
        let names: Vec<_> = pages
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["page-1.png", "page-02.png", "page-10.png"]);
    }

    #[tokio::test]
    async fn test_missing_tools_are_reported() {
        let tools = ExternalDocumentTools::new("/nonexistent/soffice", "/nonexistent/pdftoppm");
        assert!(matches!(
            tools.validate_converter().await,
            Err(DocumentError::ToolNotFound { .. })
        ));

        let dir = tempfile::TempDir::new().unwrap();
        let err = tools
            .rasterize(Path::new("in.pdf"), dir.path(), 150, &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::ToolNotFound { .. }));
    }
}
