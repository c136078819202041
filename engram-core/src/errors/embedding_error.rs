use super::EngramError;

/// Errors raised by embedding providers and the orchestrator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbeddingError {
    #[error("provider HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 429 with an optional `Retry-After` hint in milliseconds.
    #[error("rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("provider {provider} unavailable")]
    ProviderUnavailable { provider: String },

    #[error("malformed provider response: {reason}")]
    InvalidResponse { reason: String },

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl EmbeddingError {
    /// Whether the orchestrator should retry this failure with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::RateLimited { .. } | EmbeddingError::Timeout { .. } => true,
            EmbeddingError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<EmbeddingError> for EngramError {
    fn from(e: EmbeddingError) -> Self {
        if e.is_retryable() {
            EngramError::Transient {
                message: e.to_string(),
            }
        } else {
            EngramError::Degraded {
                message: e.to_string(),
            }
        }
    }
}
