//! Provider API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use lectern_core::{Credentials, ProviderError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::{api_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    /// Provider for models without a recognised prefix
    pub default: String,
    pub providers: Vec<String>,
}

/// Request body for a credential swap. Omitted fields keep their value.
#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CredentialsResponse {
    pub provider: String,
    pub updated: bool,
}

pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        default: state.providers().default_name(),
        providers: state.providers().provider_names(),
    })
}

/// Swap a provider's credentials. In-flight requests keep the old ones.
pub async fn update_credentials(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<CredentialsBody>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    if body.api_key.is_none() && body.api_base.is_none() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Provide api_key, api_base, or both",
        ));
    }

    let credentials = Credentials {
        api_key: body.api_key,
        api_base: body.api_base,
    };

    match state.providers().update_credentials(&name, credentials) {
        Ok(()) => {
            info!(provider = %name, "Provider credentials updated");
            Ok(Json(CredentialsResponse {
                provider: name,
                updated: true,
            }))
        }
        Err(ProviderError::UnknownProvider(name)) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("Provider not found: {}", name),
        )),
        Err(e @ ProviderError::Unsupported { .. }) => {
            Err(api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
        }
        Err(e) => Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}
