use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lectern_core::document::{DocumentProcessor, ExternalDocumentTools};
use lectern_core::media::{FfmpegMedia, MediaProbe};
use lectern_core::provider::{OllamaProvider, OpenAiCompatProvider, PricingTable, Provider};
use lectern_core::transcription::{
    ChatModelTranscriber, SpeechToText, TranscriptionService, WhisperApiTranscriber,
};
use lectern_core::{
    build_registry, check_dependencies, load_config, validate_config, Config, Database,
    HandlerDeps, HandlerSettings, JobEngine, RoutingProvider, SqliteJobStore, SqliteStudyStore,
    TranscriptionBackend,
};

use lectern_server::api::create_router;
use lectern_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging. LECTERN_LOG_FORMAT=json switches to one JSON object per line.
    let json_logs = std::env::var("LECTERN_LOG_FORMAT").is_ok_and(|format| format == "json");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // Determine config path
    let config_path = std::env::var("LECTERN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Workers: {}", config.engine.workers);

    let db = Database::open(&config.database.path).context("Failed to open database")?;

    let providers = Arc::new(build_providers(&config));
    info!(
        "Providers: {:?} (default: {})",
        providers.provider_names(),
        providers.default_name()
    );
    let provider: Arc<dyn Provider> = providers.clone();

    // External tools
    let media = Arc::new(FfmpegMedia::new(
        &config.tools.ffprobe_path,
        &config.tools.ffmpeg_path,
    ));
    let document_tools = Arc::new(ExternalDocumentTools::new(
        &config.tools.soffice_path,
        &config.tools.pdftoppm_path,
    ));

    let dependencies = check_dependencies(media.as_ref(), document_tools.as_ref()).await;
    dependencies
        .ensure_required()
        .context("Required external tools are missing")?;

    let stt = build_transcriber(&config, Arc::clone(&provider))?;
    info!("Transcription backend: {}", stt.name());

    let transcription = Arc::new(TranscriptionService::new(
        media as Arc<dyn MediaProbe>,
        stt,
    ));
    let documents = Arc::new(DocumentProcessor::new(
        document_tools,
        Arc::clone(&provider),
        config.models.ocr.clone(),
        config.tools.render_dpi,
    ));

    let deps = HandlerDeps {
        study: SqliteStudyStore::new(db.clone()),
        provider,
        transcription,
        documents,
        settings: Arc::new(HandlerSettings {
            language: config.study.language.clone(),
            material_model: config.models.material.clone(),
            max_cost_per_job: config.limits.max_cost_per_job,
            data_dir: config.storage.data_dir.clone(),
        }),
    };
    let registry = build_registry(&deps).context("Failed to register job handlers")?;

    // Start the job engine
    let store = Arc::new(SqliteJobStore::new(db));
    let engine = Arc::new(JobEngine::new(config.engine.clone(), store, registry));
    engine.start().await;
    info!("Job engine started");

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&engine),
        providers,
        dependencies,
    ));

    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    engine.stop().await;
    info!("Job engine stopped");

    Ok(())
}

/// Register every configured provider behind one router.
fn build_providers(config: &Config) -> RoutingProvider {
    let providers = &config.providers;
    let pricing = PricingTable::new(providers.pricing.clone());
    let router = RoutingProvider::new(providers.default.clone());

    if let Some(ref openrouter) = providers.openrouter {
        router.register(Arc::new(
            OpenAiCompatProvider::openrouter(&openrouter.api_base, openrouter.api_key.clone())
                .with_pricing(pricing.clone()),
        ));
    }
    if let Some(ref openai) = providers.openai {
        router.register(Arc::new(
            OpenAiCompatProvider::openai(&openai.api_base, openai.api_key.clone())
                .with_pricing(pricing.clone()),
        ));
    }
    if let Some(ref ollama) = providers.ollama {
        router.register(Arc::new(
            OllamaProvider::new(&ollama.api_base).with_pricing(pricing),
        ));
    }

    router
}

fn build_transcriber(config: &Config, provider: Arc<dyn Provider>) -> Result<Arc<dyn SpeechToText>> {
    let model = config.models.transcription.clone();
    match config.models.transcription_backend {
        TranscriptionBackend::WhisperApi => {
            let openai = config
                .providers
                .openai
                .as_ref()
                .context("whisper_api transcription requires [providers.openai]")?;
            Ok(Arc::new(WhisperApiTranscriber::new(
                &openai.api_base,
                openai.api_key.clone(),
                model,
            )))
        }
        TranscriptionBackend::Chat => Ok(Arc::new(ChatModelTranscriber::new(provider, model))),
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
