use axum::{extract::State, Json};
use lectern_core::{DependencyReport, EngineStatus, SanitizedConfig};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine_running: bool,
    pub dependencies: DependencyReport,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let dependencies = state.dependencies().clone();
    let status = if dependencies.all_available() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status: status.to_string(),
        engine_running: state.engine().is_running(),
        dependencies,
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Worker pool status: active jobs and counters since start.
pub async fn engine_status(State(state): State<Arc<AppState>>) -> Json<EngineStatus> {
    Json(state.engine().status().await)
}
