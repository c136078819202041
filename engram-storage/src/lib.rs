//! # engram-storage
//!
//! Persistence for the engram system: the metadata store facade over an
//! embedded SQLite engine and a client/server Postgres engine, the
//! idempotent schema migrations, tenant-scoped domain queries, and the
//! two vector store backends (SQL rows and KV records with an optional
//! HNSW index).

pub mod meta;
pub mod migrations;
pub mod queries;
pub mod sql;
pub mod tenant;
pub mod vector;

pub use meta::{MetaStore, MetaTxn};
pub use sql::{SqlDialect, SqlExecutor, SqlRow, SqlValue};
pub use vector::{KvVectorStore, SqlVectorStore};
