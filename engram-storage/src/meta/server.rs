//! Server metadata backend: Postgres through a sqlx pool.
//!
//! Statements arrive in SQLite flavour and are rewritten (`?` → `$N`)
//! before execution. Concurrency is the backend's MVCC; transactions
//! check out one pooled connection and roll back on drop.

use std::time::Duration;

use engram_core::errors::{EngramResult, StorageError};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};
use tracing::debug;

use crate::sql::placeholder;
use crate::sql::{SqlRow, SqlValue};

pub struct ServerBackend {
    pub(crate) pool: PgPool,
}

impl ServerBackend {
    /// Build the pool. Connections are established lazily, so this does
    /// not require the server to be reachable yet.
    pub fn open(dsn: &str, pool_size: u32) -> EngramResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size.max(1))
            .acquire_timeout(Duration::from_millis(100))
            .connect_lazy(dsn)
            .map_err(|e| pg_err(e.to_string()))?;
        debug!(pool_size, "server metadata backend configured");
        Ok(Self { pool })
    }

    pub(crate) fn bind_query<'q>(
        sql: &'q str,
        params: &'q [SqlValue],
    ) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
        let mut q = sqlx::query(sql);
        for p in params {
            q = match p {
                SqlValue::Null => q.bind(None::<String>),
                SqlValue::Integer(v) => q.bind(*v),
                SqlValue::Real(v) => q.bind(*v),
                SqlValue::Text(v) => q.bind(v.as_str()),
                SqlValue::Blob(v) => q.bind(v.as_slice()),
                SqlValue::Json(v) => q.bind(v),
            };
        }
        q
    }

    pub(crate) fn rewrite(sql: &str) -> String {
        placeholder::rewrite(sql)
    }
}

/// Decode a Postgres row into the backend-neutral shape by column type.
pub(crate) fn decode_row(row: &PgRow) -> EngramResult<SqlRow> {
    let mut cols = Vec::with_capacity(row.columns().len());
    let mut vals = Vec::with_capacity(row.columns().len());

    for col in row.columns() {
        let name = col.name().to_string();
        let idx = col.ordinal();
        let type_name = col.type_info().name().to_uppercase();

        let value = match type_name.as_str() {
            // Integer decoding is width-strict in sqlx.
            "INT2" => row
                .try_get::<Option<i16>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, |i| SqlValue::Integer(i as i64))),
            "INT4" => row
                .try_get::<Option<i32>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, |i| SqlValue::Integer(i as i64))),
            "INT8" => row
                .try_get::<Option<i64>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Integer)),
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, |f| SqlValue::Real(f as f64))),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Real)),
            "BOOL" => row
                .try_get::<Option<bool>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, |b| SqlValue::Integer(b as i64))),
            "BYTEA" => row
                .try_get::<Option<Vec<u8>>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Blob)),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Json)),
            _ => row
                .try_get::<Option<String>, _>(idx)
                .map(|v| v.map_or(SqlValue::Null, SqlValue::Text)),
        }
        .map_err(|e| pg_err(format!("decode column {name}: {e}")))?;

        cols.push(name);
        vals.push(value);
    }

    Ok(SqlRow::new(cols, vals))
}

pub(crate) fn pg_err(message: impl Into<String>) -> engram_core::errors::EngramError {
    let message = message.into();
    // Pool timeouts and serialization failures are retryable.
    if message.contains("pool timed out") || message.contains("40001") {
        StorageError::Busy { message }.into()
    } else {
        StorageError::Postgres { message }.into()
    }
}
