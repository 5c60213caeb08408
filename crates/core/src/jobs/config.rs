//! Job engine configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Number of concurrent workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// How often idle workers poll for pending jobs, and how often a running
    /// job checks its row for an external cancel request (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Root for per-job scratch directories.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Optional deadline per job. A job past it is cancelled.
    #[serde(default)]
    pub job_timeout_secs: Option<u64>,

    /// Fail jobs left running by a previous process when starting.
    #[serde(default = "default_true")]
    pub recover_stale_on_start: bool,

    /// How long `stop` waits for running jobs before cancelling them.
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

fn default_workers() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    1000 // 1 second
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("lectern-jobs")
}

fn default_true() -> bool {
    true
}

fn default_shutdown_grace() -> u64 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            poll_interval_ms: default_poll_interval(),
            scratch_dir: default_scratch_dir(),
            job_timeout_secs: None,
            recover_stale_on_start: true,
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_secs.map(Duration::from_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert!(config.job_timeout().is_none());
        assert!(config.recover_stale_on_start);
        assert!(config.scratch_dir.ends_with("lectern-jobs"));
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            workers = 4
            job_timeout_secs = 3600
        "#;
        let config: EngineConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.job_timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.shutdown_grace_secs, 30);
    }
}
