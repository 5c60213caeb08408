//! Shared harness for engine integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use lectern_core::document::DocumentProcessor;
use lectern_core::testing::{
    fixtures, MockDocumentTools, MockMediaProbe, MockProvider, MockSpeechToText,
};
use lectern_core::transcription::TranscriptionService;
use lectern_core::{
    build_registry, Database, HandlerDeps, HandlerSettings, JobEngine, JobStore, SqliteJobStore,
    SqliteStudyStore,
};

/// Engine wired to real stores over one in-memory database and mock externals.
pub struct TestHarness {
    pub engine: JobEngine,
    pub store: Arc<SqliteJobStore>,
    pub study: SqliteStudyStore,
    pub media: Arc<MockMediaProbe>,
    pub stt: Arc<MockSpeechToText>,
    pub tools: Arc<MockDocumentTools>,
    pub provider: Arc<MockProvider>,
    pub dir: TempDir,
}

pub struct HarnessOptions {
    pub workers: usize,
    pub pages: usize,
    pub max_cost_per_job: Option<f64>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            pages: 3,
            max_cost_per_job: None,
        }
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let db = Database::in_memory().expect("Failed to open database");

        let store = Arc::new(SqliteJobStore::new(db.clone()));
        let study = SqliteStudyStore::new(db);
        let media = Arc::new(MockMediaProbe::new());
        let stt = Arc::new(MockSpeechToText::new());
        let tools = Arc::new(MockDocumentTools::new(options.pages));
        let provider = Arc::new(MockProvider::named("openrouter"));

        let deps = HandlerDeps {
            study: study.clone(),
            provider: provider.clone(),
            transcription: Arc::new(TranscriptionService::new(media.clone(), stt.clone())),
            documents: Arc::new(DocumentProcessor::new(
                tools.clone(),
                provider.clone(),
                "vision-model",
                150,
            )),
            settings: Arc::new(HandlerSettings {
                language: "en".to_string(),
                material_model: "material-model".to_string(),
                max_cost_per_job: options.max_cost_per_job,
                data_dir: dir.path().join("data"),
            }),
        };
        let registry = build_registry(&deps).expect("Failed to build registry");

        let mut config = fixtures::engine_config(&dir.path().join("scratch"));
        config.workers = options.workers;
        let engine = JobEngine::new(config, store.clone() as Arc<dyn JobStore>, registry);

        Self {
            engine,
            store,
            study,
            media,
            stt,
            tools,
            provider,
            dir,
        }
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    /// Writes a source file under the temp dir and returns its path.
    pub fn source_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join("sources").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }
}

/// Number of entries in a directory, zero when it does not exist.
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
