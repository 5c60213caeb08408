//! Startup check for the external tools the job handlers shell out to.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::document::ExternalDocumentTools;
use crate::media::MediaProbe;

#[derive(Debug, Error)]
#[error("required tools unavailable: {}", .0.join("; "))]
pub struct MissingDependencies(pub Vec<String>);

/// Result of probing one tool group.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCheck {
    pub name: &'static str,
    /// Jobs that cannot run at all without it.
    pub required: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyReport {
    pub tools: Vec<ToolCheck>,
}

impl DependencyReport {
    fn record(&mut self, name: &'static str, required: bool, result: Result<(), String>) {
        match &result {
            Ok(()) => info!(tool = name, "External tool available"),
            Err(e) if required => error!(tool = name, error = %e, "Required external tool unavailable"),
            Err(e) => warn!(tool = name, error = %e, "Optional external tool unavailable"),
        }
        self.tools.push(ToolCheck {
            name,
            required,
            available: result.is_ok(),
            error: result.err(),
        });
    }

    pub fn all_available(&self) -> bool {
        self.tools.iter().all(|t| t.available)
    }

    /// Fails when any required tool is missing.
    pub fn ensure_required(&self) -> Result<(), MissingDependencies> {
        let missing: Vec<String> = self
            .tools
            .iter()
            .filter(|t| t.required && !t.available)
            .map(|t| format!("{}: {}", t.name, t.error.as_deref().unwrap_or("unavailable")))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MissingDependencies(missing))
        }
    }
}

/// Probes every external tool once.
///
/// ffmpeg/ffprobe and pdftoppm are required: transcription and every
/// document depend on them. The office converter is optional, since PDF
/// uploads never need it.
pub async fn check_dependencies(
    media: &dyn MediaProbe,
    documents: &ExternalDocumentTools,
) -> DependencyReport {
    let mut report = DependencyReport::default();
    report.record(
        "ffmpeg",
        true,
        media.validate().await.map_err(|e| e.to_string()),
    );
    report.record(
        "pdftoppm",
        true,
        documents.validate_rasterizer().await.map_err(|e| e.to_string()),
    );
    report.record(
        "soffice",
        false,
        documents.validate_converter().await.map_err(|e| e.to_string()),
    );
    report
}
