//! AI backend abstraction.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when calling an AI backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The backend rejected the call for quota reasons.
    #[error("Quota exceeded on {0}")]
    QuotaExceeded(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The request could not be built; nothing was sent.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request timeout")]
    Timeout,
}

impl BackendError {
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, BackendError::QuotaExceeded(_))
    }

    /// Whether the call reached the backend and so counted against its budget.
    pub fn reached_backend(&self) -> bool {
        matches!(
            self,
            BackendError::QuotaExceeded(_)
                | BackendError::Api { .. }
                | BackendError::InvalidResponse(_)
        )
    }
}

/// Text generation backend.
///
/// Knows nothing about batching or quotas; `resource` names the model or
/// endpoint to use and matches a quota resource name.
#[async_trait]
pub trait AiBackend: Send + Sync {
    async fn generate(&self, resource: &str, prompt: &str) -> Result<String, BackendError>;
}
