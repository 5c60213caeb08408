use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::jobs::EngineConfig;
use crate::provider::ModelPricing;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("lectern.db")
}

/// Chat backends. A backend is enabled by the presence of its section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProvidersConfig {
    /// Provider used for models without a recognised `"<provider>:"` prefix.
    #[serde(default = "default_provider")]
    pub default: String,
    #[serde(default)]
    pub openrouter: Option<OpenRouterConfig>,
    #[serde(default)]
    pub openai: Option<OpenAiConfig>,
    #[serde(default)]
    pub ollama: Option<OllamaConfig>,
    /// Prices for models whose backend does not report cost.
    #[serde(default)]
    pub pricing: Vec<ModelPricing>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            default: default_provider(),
            openrouter: None,
            openai: None,
            ollama: None,
            pricing: Vec::new(),
        }
    }
}

impl ProvidersConfig {
    /// Names of the enabled backends.
    pub fn configured(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.openrouter.is_some() {
            names.push("openrouter");
        }
        if self.openai.is_some() {
            names.push("openai");
        }
        if self.ollama.is_some() {
            names.push("ollama");
        }
        names
    }
}

fn default_provider() -> String {
    "openrouter".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openrouter_base")]
    pub api_base: String,
}

fn default_openrouter_base() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_openai_base")]
    pub api_base: String,
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base")]
    pub api_base: String,
}

fn default_ollama_base() -> String {
    "http://localhost:11434".to_string()
}

/// Speech-to-text backend for TRANSCRIBE_MEDIA jobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionBackend {
    /// `/audio/transcriptions` on the OpenAI provider.
    #[default]
    WhisperApi,
    /// An audio-capable chat model, routed like any other model.
    Chat,
}

/// Model selection per task. Names may carry a `"<provider>:"` prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsConfig {
    #[serde(default = "default_transcription_model")]
    pub transcription: String,
    #[serde(default)]
    pub transcription_backend: TranscriptionBackend,
    #[serde(default = "default_vision_model")]
    pub ocr: String,
    #[serde(default = "default_vision_model")]
    pub material: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            transcription: default_transcription_model(),
            transcription_backend: TranscriptionBackend::default(),
            ocr: default_vision_model(),
            material: default_vision_model(),
        }
    }
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_vision_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

/// Safety limits enforced around job execution.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// USD ceiling per job run. Unlimited when absent.
    #[serde(default)]
    pub max_cost_per_job: Option<f64>,
    /// Retries allowed after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_cost_per_job: None,
            max_retries: default_max_retries(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StudyConfig {
    /// Language for transcripts, OCR and generated material.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

/// External tool locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolsConfig {
    #[serde(default = "default_ffprobe")]
    pub ffprobe_path: PathBuf,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_soffice")]
    pub soffice_path: PathBuf,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_path: PathBuf,
    /// Page rendering resolution for OCR.
    #[serde(default = "default_render_dpi")]
    pub render_dpi: u32,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffprobe_path: default_ffprobe(),
            ffmpeg_path: default_ffmpeg(),
            soffice_path: default_soffice(),
            pdftoppm_path: default_pdftoppm(),
            render_dpi: default_render_dpi(),
        }
    }
}

fn default_ffprobe() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_ffmpeg() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_soffice() -> PathBuf {
    PathBuf::from("soffice")
}

fn default_pdftoppm() -> PathBuf {
    PathBuf::from("pdftoppm")
}

fn default_render_dpi() -> u32 {
    150
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Durable job output (page images).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub providers: SanitizedProvidersConfig,
    pub models: ModelsConfig,
    pub limits: LimitsConfig,
    pub study: StudyConfig,
    pub tools: ToolsConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProvidersConfig {
    pub default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openrouter: Option<SanitizedRemoteProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<SanitizedRemoteProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama: Option<OllamaConfig>,
    pub pricing: Vec<ModelPricing>,
}

/// Remote backend with its API key hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRemoteProvider {
    pub api_base: String,
    pub api_key_configured: bool,
}

fn key_configured(key: &Option<String>) -> bool {
    key.as_deref().is_some_and(|k| !k.is_empty())
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let providers = &config.providers;
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            engine: config.engine.clone(),
            providers: SanitizedProvidersConfig {
                default: providers.default.clone(),
                openrouter: providers.openrouter.as_ref().map(|p| SanitizedRemoteProvider {
                    api_base: p.api_base.clone(),
                    api_key_configured: key_configured(&p.api_key),
                }),
                openai: providers.openai.as_ref().map(|p| SanitizedRemoteProvider {
                    api_base: p.api_base.clone(),
                    api_key_configured: key_configured(&p.api_key),
                }),
                ollama: providers.ollama.clone(),
                pricing: providers.pricing.clone(),
            },
            models: config.models.clone(),
            limits: config.limits.clone(),
            study: config.study.clone(),
            tools: config.tools.clone(),
            storage: config.storage.clone(),
        }
    }
}
