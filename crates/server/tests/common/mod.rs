//! Common test utilities for API testing with mocks.
//!
//! The fixture builds the real router over an in-memory database, with
//! mock media, speech-to-text, document tools and model providers behind
//! the job handlers.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use lectern_core::config::OpenRouterConfig;
use lectern_core::document::DocumentProcessor;
use lectern_core::provider::OllamaProvider;
use lectern_core::testing::{MockDocumentTools, MockMediaProbe, MockProvider, MockSpeechToText};
use lectern_core::transcription::TranscriptionService;
use lectern_core::{
    build_registry, Config, Database, DependencyReport, HandlerDeps, HandlerSettings, JobEngine,
    JobStore, RoutingProvider, SqliteJobStore, SqliteStudyStore,
};
use lectern_server::state::AppState;

/// Re-export fixtures for test convenience
pub use lectern_core::testing::fixtures;

/// API key placed in the fixture config; must never appear in responses.
pub const SECRET_KEY: &str = "sk-or-fixture-secret";

/// Test fixture with an in-process router and controllable mocks.
pub struct TestFixture {
    pub router: Router,
    pub engine: Arc<JobEngine>,
    pub store: Arc<SqliteJobStore>,
    pub study: SqliteStudyStore,
    pub media: Arc<MockMediaProbe>,
    pub stt: Arc<MockSpeechToText>,
    pub provider: Arc<MockProvider>,
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Start the worker pool; otherwise jobs stay pending.
    pub start_engine: bool,
}

impl TestConfig {
    pub fn with_engine() -> Self {
        Self { start_engine: true }
    }
}

impl TestFixture {
    /// Create a fixture whose engine is not running.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::in_memory().expect("Failed to open database");

        let mut config = Config::default();
        config.providers.openrouter = Some(OpenRouterConfig {
            api_key: Some(SECRET_KEY.to_string()),
            api_base: "https://openrouter.ai/api/v1".to_string(),
        });
        config.engine = fixtures::engine_config(&temp_dir.path().join("scratch"));
        config.storage.data_dir = temp_dir.path().join("data");

        let study = SqliteStudyStore::new(db.clone());
        let media = Arc::new(MockMediaProbe::new());
        let stt = Arc::new(MockSpeechToText::new());
        let tools = Arc::new(MockDocumentTools::new(2));
        let provider = Arc::new(MockProvider::named("openrouter"));

        let providers = Arc::new(
            RoutingProvider::new("openrouter")
                .with_provider(provider.clone())
                .with_provider(Arc::new(OllamaProvider::new("http://localhost:11434"))),
        );

        let deps = HandlerDeps {
            study: study.clone(),
            provider: providers.clone(),
            transcription: Arc::new(TranscriptionService::new(media.clone(), stt.clone())),
            documents: Arc::new(DocumentProcessor::new(
                tools,
                providers.clone(),
                "vision-model",
                150,
            )),
            settings: Arc::new(HandlerSettings {
                language: "en".to_string(),
                material_model: "material-model".to_string(),
                max_cost_per_job: None,
                data_dir: config.storage.data_dir.clone(),
            }),
        };
        let registry = build_registry(&deps).expect("Failed to build registry");

        let store = Arc::new(SqliteJobStore::new(db));
        let engine = Arc::new(JobEngine::new(
            config.engine.clone(),
            store.clone() as Arc<dyn JobStore>,
            registry,
        ));
        if test_config.start_engine {
            engine.start().await;
        }

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&engine),
            providers,
            DependencyReport::default(),
        ));
        let router = lectern_server::api::create_router(state);

        Self {
            router,
            engine,
            store,
            study,
            media,
            stt,
            provider,
            temp_dir,
        }
    }

    /// Writes a file under the temp dir and returns its path.
    pub fn source_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join("sources").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a PUT request with JSON body.
    pub async fn put(&self, path: &str, body: Value) -> TestResponse {
        self.request("PUT", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        self.send(request_builder.body(body).unwrap()).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
