use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Which engine backs the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataBackend {
    /// File-backed SQLite with WAL journaling. In-memory when no path is
    /// configured.
    Embedded,
    /// Client/server Postgres via a connection pool.
    Server,
}

/// Which engine backs the per-sector vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    /// Rows in the metadata database, scan or pgvector KNN.
    Sql,
    /// Independent KV records with an optional HNSW index.
    KvIndex,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub metadata_backend: MetadataBackend,
    pub vector_backend: VectorBackend,
    /// Data directory for the embedded database and the KV store.
    /// `None` keeps everything in memory (tests).
    pub path: Option<PathBuf>,
    /// Postgres DSN for the server backend.
    pub server_dsn: Option<String>,
    pub pool_size: u32,
    /// Reject tenant-less reads on tenant-scoped tables.
    pub strict_tenant: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            metadata_backend: MetadataBackend::Embedded,
            vector_backend: VectorBackend::Sql,
            path: None,
            server_dsn: None,
            pool_size: defaults::DEFAULT_POOL_SIZE,
            strict_tenant: false,
        }
    }
}
