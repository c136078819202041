use super::EngramError;

/// Storage-layer errors for the embedded and server SQL backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("SQLite error: {message}")]
    Sqlite { message: String },

    #[error("Postgres error: {message}")]
    Postgres { message: String },

    #[error("KV store error: {message}")]
    Kv { message: String },

    /// Retryable contention: lock timeout, pool exhaustion, serialization
    /// failure.
    #[error("backend busy: {message}")]
    Busy { message: String },

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: u32, reason: String },

    #[error("stored row is corrupt: {details}")]
    Corrupt { details: String },
}

impl From<StorageError> for EngramError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Busy { message } => EngramError::Transient { message },
            other => EngramError::Internal {
                message: other.to_string(),
            },
        }
    }
}
