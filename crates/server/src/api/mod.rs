pub mod handlers;
pub mod jobs;
pub mod providers;
pub mod routes;

pub use routes::create_router;

use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}
