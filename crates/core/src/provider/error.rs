//! Error types for the provider module.

use thiserror::Error;

/// Errors from a chat backend, either at call time or on the chunk stream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    /// Transport failure (connect, TLS, broken body stream).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend answered with an error.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The backend answered with something we could not decode.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The request uses a capability this backend does not have.
    #[error("Unsupported by {provider}: {reason}")]
    Unsupported { provider: String, reason: String },

    #[error("Provider {0} is not configured")]
    NotConfigured(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn unsupported(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
