//! Error taxonomy for the engram system.
//!
//! Domain crates define their own `thiserror` enums (storage, embedding,
//! classifier) and fold into [`EngramError`] via `From`. The top-level
//! variants are what request handlers see; the short code is the stable
//! user-visible identifier, details stay in logs.

mod classifier_error;
mod embedding_error;
mod storage_error;

pub use classifier_error::ClassifierError;
pub use embedding_error::EmbeddingError;
pub use storage_error::StorageError;

/// Result alias used across the workspace.
pub type EngramResult<T> = Result<T, EngramError>;

/// Top-level error for all engram operations.
#[derive(Debug, thiserror::Error)]
pub enum EngramError {
    #[error("bad request: {message}")]
    BadRequest { message: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("forbidden: {message}")]
    Forbidden { message: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Retryable failure (provider 5xx, rate limit, backend hiccup).
    /// Recovered locally with backoff; surfacing one means retries were
    /// exhausted.
    #[error("transient failure: {message}")]
    Transient { message: String },

    /// A collaborator is unavailable this call and a fallback was used.
    /// Only ever surfaces through logs, never as a request failure.
    #[error("degraded: {message}")]
    Degraded { message: String },

    /// Invariant violation. Fatal for the request, not the process.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngramError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        EngramError::BadRequest {
            message: message.into(),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        EngramError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        EngramError::Forbidden {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        EngramError::Conflict {
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        EngramError::Transient {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngramError::Internal {
            message: message.into(),
        }
    }

    /// Stable short code for API surfaces. Details belong in logs.
    pub fn code(&self) -> &'static str {
        match self {
            EngramError::BadRequest { .. } => "bad_request",
            EngramError::NotFound { .. } => "not_found",
            EngramError::Forbidden { .. } => "forbidden",
            EngramError::Conflict { .. } => "conflict",
            EngramError::Transient { .. } => "transient",
            EngramError::Degraded { .. } => "degraded",
            EngramError::Internal { .. } => "internal",
        }
    }

    /// Whether a caller may retry the operation as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngramError::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(EngramError::bad_request("x").code(), "bad_request");
        assert_eq!(EngramError::not_found("memory", "m1").code(), "not_found");
        assert_eq!(EngramError::forbidden("x").code(), "forbidden");
        assert_eq!(EngramError::conflict("x").code(), "conflict");
        assert_eq!(EngramError::transient("x").code(), "transient");
        assert_eq!(EngramError::internal("x").code(), "internal");
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(EngramError::transient("x").is_retryable());
        assert!(!EngramError::internal("x").is_retryable());
    }

    #[test]
    fn storage_error_folds_into_taxonomy() {
        let e: EngramError = StorageError::Sqlite {
            message: "locked".into(),
        }
        .into();
        assert_eq!(e.code(), "internal");

        let e: EngramError = StorageError::Busy {
            message: "pool exhausted".into(),
        }
        .into();
        assert_eq!(e.code(), "transient");
    }
}
