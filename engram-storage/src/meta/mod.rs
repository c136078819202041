//! The metadata store facade.
//!
//! One API over two engines. Callers never see which backend is active:
//! statements are authored with `?` placeholders and epoch-millis
//! timestamps, and [`MetaStore`]/[`MetaTxn`] both implement
//! [`SqlExecutor`], so domain queries run the same against an open
//! transaction or autocommit.

mod embedded;
mod server;

pub use embedded::EmbeddedBackend;
pub use server::ServerBackend;

use std::sync::atomic::{AtomicBool, Ordering};

use engram_core::config::{MetadataBackend, StorageConfig};
use engram_core::errors::{EngramError, EngramResult};
use rusqlite::Connection;
use tracing::info;

use crate::migrations;
use crate::sql::{SqlDialect, SqlExecutor, SqlRow, SqlValue};

pub struct MetaStore {
    backend: Backend,
}

enum Backend {
    Embedded(EmbeddedBackend),
    Server(ServerBackend),
}

impl MetaStore {
    /// Open the configured backend and run migrations.
    pub async fn open(config: &StorageConfig) -> EngramResult<Self> {
        let backend = match config.metadata_backend {
            MetadataBackend::Embedded => {
                let file = config.path.as_ref().map(|dir| dir.join("engram.db"));
                Backend::Embedded(EmbeddedBackend::open(file.as_deref())?)
            }
            MetadataBackend::Server => {
                let dsn = config.server_dsn.as_deref().ok_or_else(|| {
                    EngramError::bad_request("server metadata backend requires a DSN")
                })?;
                Backend::Server(ServerBackend::open(dsn, config.pool_size)?)
            }
        };

        let store = Self { backend };
        migrations::run_migrations(&store).await?;
        info!(backend = ?config.metadata_backend, "metadata store ready");
        Ok(store)
    }

    /// In-memory embedded store (tests).
    pub async fn open_in_memory() -> EngramResult<Self> {
        let store = Self {
            backend: Backend::Embedded(EmbeddedBackend::open(None)?),
        };
        migrations::run_migrations(&store).await?;
        Ok(store)
    }

    /// Begin a transaction.
    ///
    /// Embedded: takes the FIFO writer lock for the whole transaction and
    /// issues `BEGIN IMMEDIATE`. Server: checks out one pooled connection.
    /// Either way the returned handle rolls back when dropped without
    /// commit. Domain functions take `&dyn SqlExecutor`, so inner code
    /// runs against the open transaction instead of nesting a new one.
    pub async fn begin(&self) -> EngramResult<MetaTxn> {
        match &self.backend {
            Backend::Embedded(b) => {
                let guard = b.conn.clone().lock_owned().await;
                guard
                    .execute_batch("BEGIN IMMEDIATE")
                    .map_err(|e| embedded::sqlite_err(format!("begin: {e}")))?;
                Ok(MetaTxn {
                    inner: TxnInner::Embedded {
                        guard: std::sync::Mutex::new(guard),
                        committed: AtomicBool::new(false),
                    },
                })
            }
            Backend::Server(b) => {
                let tx = b
                    .pool
                    .begin()
                    .await
                    .map_err(|e| server::pg_err(e.to_string()))?;
                Ok(MetaTxn {
                    inner: TxnInner::Server {
                        tx: tokio::sync::Mutex::new(Some(tx)),
                    },
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl SqlExecutor for MetaStore {
    fn dialect(&self) -> SqlDialect {
        match &self.backend {
            Backend::Embedded(_) => SqlDialect::Sqlite,
            Backend::Server(_) => SqlDialect::Postgres,
        }
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> EngramResult<u64> {
        match &self.backend {
            Backend::Embedded(b) => {
                let conn = b.conn.lock().await;
                EmbeddedBackend::exec_run(&conn, sql, params)
            }
            Backend::Server(b) => {
                let rewritten = ServerBackend::rewrite(sql);
                let result = ServerBackend::bind_query(&rewritten, params)
                    .execute(&b.pool)
                    .await
                    .map_err(|e| server::pg_err(format!("{e} in: {rewritten}")))?;
                Ok(result.rows_affected())
            }
        }
    }

    async fn get(&self, sql: &str, params: &[SqlValue]) -> EngramResult<Option<SqlRow>> {
        Ok(self.all(sql, params).await?.into_iter().next())
    }

    async fn all(&self, sql: &str, params: &[SqlValue]) -> EngramResult<Vec<SqlRow>> {
        match &self.backend {
            Backend::Embedded(b) => {
                let conn = b.conn.lock().await;
                EmbeddedBackend::exec_all(&conn, sql, params)
            }
            Backend::Server(b) => {
                let rewritten = ServerBackend::rewrite(sql);
                let rows = ServerBackend::bind_query(&rewritten, params)
                    .fetch_all(&b.pool)
                    .await
                    .map_err(|e| server::pg_err(format!("{e} in: {rewritten}")))?;
                rows.iter().map(server::decode_row).collect()
            }
        }
    }
}

/// An open transaction. Commit or roll back explicitly; dropping the
/// handle without either rolls back.
pub struct MetaTxn {
    inner: TxnInner,
}

enum TxnInner {
    Embedded {
        guard: std::sync::Mutex<tokio::sync::OwnedMutexGuard<Connection>>,
        committed: AtomicBool,
    },
    Server {
        tx: tokio::sync::Mutex<Option<sqlx::Transaction<'static, sqlx::Postgres>>>,
    },
}

impl MetaTxn {
    pub async fn commit(self) -> EngramResult<()> {
        match &self.inner {
            TxnInner::Embedded { guard, committed } => {
                guard
                    .lock()
                    .expect("txn guard mutex poisoned")
                    .execute_batch("COMMIT")
                    .map_err(|e| embedded::sqlite_err(format!("commit: {e}")))?;
                committed.store(true, Ordering::SeqCst);
                Ok(())
            }
            TxnInner::Server { tx } => {
                let taken = tx.lock().await.take();
                match taken {
                    Some(t) => t
                        .commit()
                        .await
                        .map_err(|e| server::pg_err(format!("commit: {e}"))),
                    None => Err(EngramError::internal("transaction already finished")),
                }
            }
        }
    }

    pub async fn rollback(self) -> EngramResult<()> {
        match &self.inner {
            TxnInner::Embedded { guard, committed } => {
                guard
                    .lock()
                    .expect("txn guard mutex poisoned")
                    .execute_batch("ROLLBACK")
                    .map_err(|e| embedded::sqlite_err(format!("rollback: {e}")))?;
                committed.store(true, Ordering::SeqCst);
                Ok(())
            }
            TxnInner::Server { tx } => {
                let taken = tx.lock().await.take();
                match taken {
                    Some(t) => t
                        .rollback()
                        .await
                        .map_err(|e| server::pg_err(format!("rollback: {e}"))),
                    None => Err(EngramError::internal("transaction already finished")),
                }
            }
        }
    }
}

impl Drop for MetaTxn {
    fn drop(&mut self) {
        if let TxnInner::Embedded { guard, committed } = &self.inner {
            if !committed.load(Ordering::SeqCst) {
                if let Ok(conn) = guard.lock() {
                    let _ = conn.execute_batch("ROLLBACK");
                }
            }
        }
        // The server transaction rolls back on its own drop.
    }
}

#[async_trait::async_trait]
impl SqlExecutor for MetaTxn {
    fn dialect(&self) -> SqlDialect {
        match &self.inner {
            TxnInner::Embedded { .. } => SqlDialect::Sqlite,
            TxnInner::Server { .. } => SqlDialect::Postgres,
        }
    }

    async fn run(&self, sql: &str, params: &[SqlValue]) -> EngramResult<u64> {
        match &self.inner {
            TxnInner::Embedded { guard, .. } => {
                EmbeddedBackend::exec_run(&guard.lock().expect("txn guard mutex poisoned"), sql, params)
            }
            TxnInner::Server { tx } => {
                let rewritten = ServerBackend::rewrite(sql);
                let mut lock = tx.lock().await;
                let tx = lock
                    .as_mut()
                    .ok_or_else(|| EngramError::internal("transaction already finished"))?;
                let result = ServerBackend::bind_query(&rewritten, params)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| server::pg_err(format!("{e} in: {rewritten}")))?;
                Ok(result.rows_affected())
            }
        }
    }

    async fn get(&self, sql: &str, params: &[SqlValue]) -> EngramResult<Option<SqlRow>> {
        Ok(self.all(sql, params).await?.into_iter().next())
    }

    async fn all(&self, sql: &str, params: &[SqlValue]) -> EngramResult<Vec<SqlRow>> {
        match &self.inner {
            TxnInner::Embedded { guard, .. } => {
                EmbeddedBackend::exec_all(&guard.lock().expect("txn guard mutex poisoned"), sql, params)
            }
            TxnInner::Server { tx } => {
                let rewritten = ServerBackend::rewrite(sql);
                let mut lock = tx.lock().await;
                let tx = lock
                    .as_mut()
                    .ok_or_else(|| EngramError::internal("transaction already finished"))?;
                let rows = ServerBackend::bind_query(&rewritten, params)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(|e| server::pg_err(format!("{e} in: {rewritten}")))?;
                rows.iter().map(server::decode_row).collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[tokio::test]
    async fn open_in_memory_and_roundtrip() {
        let store = MetaStore::open_in_memory().await.unwrap();
        store
            .run(
                "INSERT INTO embed_logs (id, memory_id, status, model, created_at, updated_at, error)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                &params!["l1", None::<String>, "pending", "synthetic", 1i64, 1i64, None::<String>],
            )
            .await
            .unwrap();
        let row = store
            .get("SELECT status FROM embed_logs WHERE id = ?", &params!["l1"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.str("status").unwrap(), "pending");
    }

    #[tokio::test]
    async fn transaction_commit_persists() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let tx = store.begin().await.unwrap();
        tx.run(
            "INSERT INTO ops_log (id, op, started_at, finished_at, affected, detail)
             VALUES (?, ?, ?, ?, ?, ?)",
            &params!["o1", "decay", 1i64, None::<i64>, 0i64, None::<String>],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let rows = store
            .all("SELECT id FROM ops_log", &params![])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = MetaStore::open_in_memory().await.unwrap();
        {
            let tx = store.begin().await.unwrap();
            tx.run(
                "INSERT INTO ops_log (id, op, started_at, finished_at, affected, detail)
                 VALUES (?, ?, ?, ?, ?, ?)",
                &params!["o1", "decay", 1i64, None::<i64>, 0i64, None::<String>],
            )
            .await
            .unwrap();
            // Dropped without commit.
        }
        let rows = store
            .all("SELECT id FROM ops_log", &params![])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn explicit_rollback() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let tx = store.begin().await.unwrap();
        tx.run(
            "INSERT INTO ops_log (id, op, started_at, finished_at, affected, detail)
             VALUES (?, ?, ?, ?, ?, ?)",
            &params!["o1", "reflect", 1i64, None::<i64>, 0i64, None::<String>],
        )
        .await
        .unwrap();
        tx.rollback().await.unwrap();

        let rows = store
            .all("SELECT id FROM ops_log", &params![])
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
