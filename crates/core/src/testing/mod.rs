//! Testing utilities and mock implementations.
//!
//! Mocks cover every external collaborator of the job handlers (chat
//! providers, the media probe, speech-to-text and the document tools), so
//! whole jobs can run against an in-memory database without network access
//! or installed binaries.
//!
//! # Example
//!
//! ```rust,ignore
//! use lectern_core::testing::{MockMediaProbe, MockSpeechToText, fixtures};
//!
//! let media = MockMediaProbe::new();
//! media.set_duration("/media/a.mp3", 60_000).await;
//!
//! let stt = MockSpeechToText::new();
//! stt.set_segments("/media/a.mp3", vec![fixtures::segment(0, 5000, "hello")]).await;
//! ```

mod mock_document_tools;
mod mock_media;
mod mock_provider;

pub use mock_document_tools::MockDocumentTools;
pub use mock_media::{MockMediaProbe, MockSpeechToText};
pub use mock_provider::{MockProvider, MockReply};

use std::time::{Duration, Instant};

use crate::jobs::{Job, JobStore};

/// Polls the store until the job reaches a terminal status.
///
/// Panics when `timeout` elapses first.
pub async fn wait_for_terminal(store: &dyn JobStore, job_id: &str, timeout: Duration) -> Job {
    let deadline = Instant::now() + timeout;
    loop {
        let job = store
            .get(job_id)
            .expect("job store read failed")
            .unwrap_or_else(|| panic!("job {} does not exist", job_id));
        if job.status.is_terminal() {
            return job;
        }
        if Instant::now() >= deadline {
            panic!(
                "job {} still {} after {:?} (progress {}: {})",
                job_id, job.status, timeout, job.progress, job.progress_message
            );
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::jobs::EngineConfig;
    use crate::transcription::RawSegment;

    /// Engine config with one worker and a fast poll, scratch under `scratch`.
    pub fn engine_config(scratch: &Path) -> EngineConfig {
        EngineConfig {
            workers: 1,
            poll_interval_ms: 20,
            scratch_dir: scratch.to_path_buf(),
            shutdown_grace_secs: 2,
            ..EngineConfig::default()
        }
    }

    /// A speech-to-text segment with confidence 0.9 and no speaker.
    pub fn segment(start_ms: u64, end_ms: u64, text: &str) -> RawSegment {
        RawSegment {
            start_ms,
            end_ms,
            text: text.to_string(),
            confidence: Some(0.9),
            speaker: None,
        }
    }
}
