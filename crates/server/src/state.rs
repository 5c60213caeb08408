use std::sync::Arc;

use lectern_core::{Config, DependencyReport, JobEngine, RoutingProvider, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Arc<JobEngine>,
    providers: Arc<RoutingProvider>,
    dependencies: DependencyReport,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<JobEngine>,
        providers: Arc<RoutingProvider>,
        dependencies: DependencyReport,
    ) -> Self {
        Self {
            config,
            engine,
            providers,
            dependencies,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn engine(&self) -> &JobEngine {
        self.engine.as_ref()
    }

    pub fn providers(&self) -> &RoutingProvider {
        self.providers.as_ref()
    }

    /// External tool availability found at startup.
    pub fn dependencies(&self) -> &DependencyReport {
        &self.dependencies
    }

    pub fn max_retries(&self) -> u32 {
        self.config.limits.max_retries
    }
}
