//! Reference document OCR pipeline.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::error::DocumentError;
use super::tools::DocumentTools;
use super::types::{ocr_failure_marker, DocumentFormat, DocumentOutput, PageText};
use crate::cancel::CancelToken;
use crate::progress::ProgressReporter;
use crate::provider::{complete, ChatRequest, ContentPart, Message, Provider, ProviderError, Role};
use crate::usage::UsageRecorder;

/// Progress after office-to-PDF conversion.
const CONVERTED_PERCENT: u8 = 5;
/// Progress after rasterization. OCR shares the rest evenly per page.
const RASTERIZED_PERCENT: u8 = 10;

const OCR_PROMPT: &str = "You are an OCR engine for lecture reference material. \
Extract all text from the page image exactly as written, preserving headings, lists, \
tables (as markdown), and formulas (as LaTeX). Describe diagrams in one short sentence \
in square brackets. Output only the extracted content, with no preamble.";

pub struct DocumentProcessor {
    tools: Arc<dyn DocumentTools>,
    provider: Arc<dyn Provider>,
    model: String,
    dpi: u32,
}

impl DocumentProcessor {
    pub fn new(
        tools: Arc<dyn DocumentTools>,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        dpi: u32,
    ) -> Self {
        Self {
            tools,
            provider,
            model: model.into(),
            dpi,
        }
    }

    /// Converts, rasterizes, and OCRs `source`, writing intermediates under `scratch`.
    ///
    /// A failed OCR call for one page stores a visible marker for that page and
    /// moves on. Cancellation, tool failures, and a refusal from `usage` after
    /// any page abort the whole document.
    pub async fn process(
        &self,
        source: &Path,
        language: &str,
        scratch: &Path,
        progress: &dyn ProgressReporter,
        usage: &dyn UsageRecorder,
        cancel: &CancelToken,
    ) -> Result<DocumentOutput, DocumentError> {
        let format = DocumentFormat::detect(source)?;
        if !source.exists() {
            return Err(DocumentError::InputNotFound {
                path: source.to_path_buf(),
            });
        }

        let pdf = if format.needs_conversion() {
            progress.report(0, "Converting document to PDF");
            let pdf = self
                .tools
                .convert_to_pdf(source, &scratch.join("pdf"), cancel)
                .await?;
            progress.report(CONVERTED_PERCENT, "Converted to PDF");
            pdf
        } else {
            source.to_path_buf()
        };

        progress.report(CONVERTED_PERCENT, "Rendering pages");
        let images = self
            .tools
            .rasterize(&pdf, &scratch.join("pages"), self.dpi, cancel)
            .await?;
        if images.is_empty() {
            return Err(DocumentError::NoPages);
        }
        let total = images.len();
        progress.report(RASTERIZED_PERCENT, &format!("Rendered {} page(s)", total));

        let mut pages = Vec::with_capacity(total);

        for (index, image_path) in images.into_iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(DocumentError::Cancelled);
            }
            let page_number = (index + 1) as u32;
            let bytes = tokio::fs::read(&image_path).await?;

            let (text, ocr_failed) = match self.ocr_page(&bytes, language, cancel).await {
                Ok(completion) => {
                    usage.record(&completion.usage)?;
                    (completion.text.trim().to_string(), false)
                }
                Err(ProviderError::Cancelled) => return Err(DocumentError::Cancelled),
                Err(e) => {
                    warn!(page = page_number, error = %e, "OCR failed for page, keeping marker");
                    (ocr_failure_marker(page_number, &e.to_string()), true)
                }
            };

            pages.push(PageText {
                page_number,
                image_path,
                text,
                ocr_failed,
            });

            let percent = RASTERIZED_PERCENT as usize
                + (100 - RASTERIZED_PERCENT as usize) * (index + 1) / total;
            progress.report(
                percent as u8,
                &format!("OCR page {} of {}", page_number, total),
            );
        }

        let output = DocumentOutput { pages };
        info!(
            source = %source.display(),
            pages = total,
            failed_pages = output.failed_pages().len(),
            "Document processed"
        );
        Ok(output)
    }

    async fn ocr_page(
        &self,
        png: &[u8],
        language: &str,
        cancel: &CancelToken,
    ) -> Result<crate::provider::Completion, ProviderError> {
        let request = ChatRequest::new(self.model.clone())
            .with_message(Message::new(
                Role::User,
                vec![
                    ContentPart::text(format!(
                        "{} The material is expected to be in language: {}.",
                        OCR_PROMPT, language
                    )),
                    ContentPart::image_bytes("image/png", png),
                ],
            ))
            .with_temperature(0.0);
        complete(self.provider.as_ref(), request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use crate::provider::ChatUsage;
    use crate::testing::{MockDocumentTools, MockProvider, MockReply};
    use crate::usage::UsageTally;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressReporter for Recorder {
        fn report(&self, percent: u8, _message: &str) {
            self.0.lock().unwrap().push(percent);
        }
    }

    fn processor(tools: Arc<MockDocumentTools>, provider: Arc<MockProvider>) -> DocumentProcessor {
        DocumentProcessor::new(tools, provider, "qwen-vl", 150)
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_before_any_work() {
        let tools = Arc::new(MockDocumentTools::new(3));
        let provider = Arc::new(MockProvider::named("openrouter"));
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, "text").unwrap();

        let err = processor(tools.clone(), provider.clone())
            .process(
                &source,
                "en",
                dir.path(),
                &NoopProgress,
                &UsageTally::new(),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::UnsupportedFormat { .. }));
        assert_eq!(tools.rasterize_calls(), 0);
        assert!(provider.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_office_document_is_converted_and_progress_banded() {
        let tools = Arc::new(MockDocumentTools::new(4));
        let provider = Arc::new(MockProvider::named("openrouter"));
        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("week1.pptx");
        std::fs::write(&source, "pptx").unwrap();

        let recorder = Recorder::default();
        let output = processor(tools.clone(), provider)
            .process(
                &source,
                "en",
                dir.path(),
                &recorder,
                &UsageTally::new(),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(tools.convert_calls(), 1);
        assert_eq!(output.pages.len(), 4);
        let progress = recorder.0.lock().unwrap().clone();
        assert_eq!(progress, vec![0, 5, 5, 10, 32, 55, 77, 100]);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_page_failure_keeps_marker_and_continues() {
        let tools = Arc::new(MockDocumentTools::new(3));
        let provider = Arc::new(MockProvider::named("openrouter"));
        provider.push_reply("page one").await;
        provider
            .push(MockReply::StreamError {
                partial: "garb".to_string(),
                error: ProviderError::Http("connection reset".to_string()),
            })
            .await;
        provider.push_reply("page three").await;

        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("slides.pdf");
        std::fs::write(&source, "%PDF").unwrap();

        let output = processor(tools.clone(), provider)
            .process(
                &source,
                "en",
                dir.path(),
                &NoopProgress,
                &UsageTally::new(),
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(tools.convert_calls(), 0);
        let numbers: Vec<u32> = output.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(output.pages[0].text, "page one");
        assert!(output.pages[1].text.starts_with("[OCR failed for page 2:"));
        assert!(output.pages[1].text.contains("connection reset"));
        assert_eq!(output.pages[2].text, "page three");
        assert_eq!(output.failed_pages(), vec![2]);
    }

    #[tokio::test]
    async fn test_cancellation_aborts_document() {
        let tools = Arc::new(MockDocumentTools::new(2));
        let provider = Arc::new(MockProvider::named("openrouter"));
        provider.push(MockReply::Hang).await;

        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("slides.pdf");
        std::fs::write(&source, "%PDF").unwrap();

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = processor(tools, provider)
            .process(&source, "en", dir.path(), &NoopProgress, &UsageTally::new(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_each_page_is_billed_before_the_next_call() {
        let tools = Arc::new(MockDocumentTools::new(3));
        let provider = Arc::new(MockProvider::named("openrouter"));
        provider.push_reply("page one").await;
        provider.push(MockReply::Hang).await;
        provider
            .set_usage(ChatUsage {
                input_tokens: 1500,
                output_tokens: 300,
                cost: Some(0.25),
            })
            .await;

        let dir = tempfile::TempDir::new().unwrap();
        let source = dir.path().join("slides.pdf");
        std::fs::write(&source, "%PDF").unwrap();

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let tally = UsageTally::new();
        let err = processor(tools, provider.clone())
            .process(&source, "en", dir.path(), &NoopProgress, &tally, &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(provider.requests().await.len(), 2);
        assert_eq!(tally.total().cost, Some(0.25));
        assert_eq!(tally.total().input_tokens, 1500);
    }
}
