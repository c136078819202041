//! Embedded metadata backend: SQLite behind a FIFO writer lock.
//!
//! The engine is single-writer, so one connection serves everything and
//! a fair async mutex (tokio's is FIFO) serialises tasks. Transactions
//! hold the lock for their whole extent: `BEGIN IMMEDIATE` → work →
//! `COMMIT`, with `ROLLBACK` on drop.

use std::path::Path;
use std::sync::Arc;

use engram_core::constants::STATEMENT_CACHE_CAP;
use engram_core::errors::{EngramResult, StorageError};
use rusqlite::Connection;
use tracing::debug;

use crate::sql::{SqlRow, SqlValue};

pub(crate) type SharedConn = Arc<tokio::sync::Mutex<Connection>>;

pub struct EmbeddedBackend {
    pub(crate) conn: SharedConn,
}

impl EmbeddedBackend {
    /// Open a file-backed database (WAL journaling) or an in-memory one
    /// when no path is given.
    pub fn open(path: Option<&Path>) -> EngramResult<Self> {
        let conn = match path {
            Some(p) => {
                if let Some(dir) = p.parent() {
                    std::fs::create_dir_all(dir)
                        .map_err(|e| sqlite_err(format!("create data dir: {e}")))?;
                }
                Connection::open(p).map_err(|e| sqlite_err(e.to_string()))?
            }
            None => Connection::open_in_memory().map_err(|e| sqlite_err(e.to_string()))?,
        };

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            ",
        )
        .map_err(|e| sqlite_err(e.to_string()))?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE_CAP);

        debug!(path = ?path, "embedded metadata backend opened");
        Ok(Self {
            conn: Arc::new(tokio::sync::Mutex::new(conn)),
        })
    }

    pub(crate) fn exec_run(
        conn: &Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> EngramResult<u64> {
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| sqlite_err(format!("{e} in: {sql}")))?;
        bind_all(&mut stmt, params)?;
        let n = stmt
            .raw_execute()
            .map_err(|e| sqlite_err(format!("{e} in: {sql}")))?;
        Ok(n as u64)
    }

    pub(crate) fn exec_all(
        conn: &Connection,
        sql: &str,
        params: &[SqlValue],
    ) -> EngramResult<Vec<SqlRow>> {
        let mut stmt = conn
            .prepare_cached(sql)
            .map_err(|e| sqlite_err(format!("{e} in: {sql}")))?;
        let cols: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        bind_all(&mut stmt, params)?;

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| sqlite_err(e.to_string()))? {
            let mut vals = Vec::with_capacity(cols.len());
            for i in 0..cols.len() {
                let v = row
                    .get_ref(i)
                    .map_err(|e| sqlite_err(e.to_string()))?;
                vals.push(from_sqlite(v));
            }
            out.push(SqlRow::new(cols.clone(), vals));
        }
        Ok(out)
    }
}

fn bind_all(stmt: &mut rusqlite::CachedStatement<'_>, params: &[SqlValue]) -> EngramResult<()> {
    for (i, p) in params.iter().enumerate() {
        let idx = i + 1;
        let result = match p {
            SqlValue::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
            SqlValue::Integer(v) => stmt.raw_bind_parameter(idx, v),
            SqlValue::Real(v) => stmt.raw_bind_parameter(idx, v),
            SqlValue::Text(v) => stmt.raw_bind_parameter(idx, v),
            SqlValue::Blob(v) => stmt.raw_bind_parameter(idx, v),
            // SQLite has no JSON parameter type; bind the serialized form.
            SqlValue::Json(v) => stmt.raw_bind_parameter(idx, v.to_string()),
        };
        result.map_err(|e| sqlite_err(format!("bind {idx}: {e}")))?;
    }
    Ok(())
}

fn from_sqlite(v: rusqlite::types::ValueRef<'_>) -> SqlValue {
    use rusqlite::types::ValueRef;
    match v {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(t) => SqlValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
    }
}

pub(crate) fn sqlite_err(message: impl Into<String>) -> engram_core::errors::EngramError {
    StorageError::Sqlite {
        message: message.into(),
    }
    .into()
}
