//! Error types for the dialogue engine.

use wayfarer_core::error::WayfarerError;
use wayfarer_core::types::SessionId;

/// Errors surfaced by the dialogue engine.
///
/// Provider failures during a turn are absorbed into partial contexts and
/// fallback replies rather than surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("invalid mode transition: {0}")]
    InvalidModeTransition(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<ChatError> for WayfarerError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Provider(e) => WayfarerError::Provider(e.to_string()),
            other => WayfarerError::Session(other.to_string()),
        }
    }
}

/// Failure of a single external provider call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} timed out after {after_ms} ms")]
    Timeout { provider: String, after_ms: u64 },
    #[error("{provider} returned HTTP {status}: {message}")]
    Http {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("{provider} request failed: {message}")]
    Network { provider: String, message: String },
    #[error("{provider} returned an invalid response: {message}")]
    InvalidResponse { provider: String, message: String },
    #[error("{provider} is not configured")]
    NotConfigured { provider: String },
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }

    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Timeout { provider, .. }
            | ProviderError::Http { provider, .. }
            | ProviderError::Network { provider, .. }
            | ProviderError::InvalidResponse { provider, .. }
            | ProviderError::NotConfigured { provider } => provider,
        }
    }
}

impl From<ProviderError> for WayfarerError {
    fn from(err: ProviderError) -> Self {
        WayfarerError::Provider(err.to_string())
    }
}
