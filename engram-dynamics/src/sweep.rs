//! The dual-phase decay sweep.
//!
//! Walks every memory in 1 000-row pages, multiplies salience by the
//! dual-phase retention for the time since last recall, and writes back
//! only meaningful changes. Yields to the runtime every 5 000 rows and
//! checks the cancellation token between pages, so a cancelled sweep
//! stops on a page boundary with storage consistent.

use std::sync::Arc;

use chrono::Utc;
use engram_core::cancel::CancellationToken;
use engram_core::config::DynamicsConfig;
use engram_core::constants::{DECAY_PAGE_SIZE, DECAY_WRITE_EPSILON, DECAY_YIELD_EVERY};
use engram_core::errors::EngramResult;
use engram_core::models::OpsLogEntry;
use engram_storage::meta::MetaStore;
use engram_storage::queries::{log_ops, memory_ops};
use tracing::{debug, info};

use crate::salience::retention_dual;

pub struct DecaySweep {
    meta: Arc<MetaStore>,
    config: DynamicsConfig,
}

impl DecaySweep {
    pub fn new(meta: Arc<MetaStore>, config: DynamicsConfig) -> Self {
        Self { meta, config }
    }

    /// Run one full sweep. Returns the number of rows written back.
    pub async fn run(&self, cancel: &CancellationToken) -> EngramResult<u64> {
        let entry = OpsLogEntry::started("decay");
        log_ops::insert_ops_entry(self.meta.as_ref(), &entry).await?;

        let now = Utc::now();
        let mut offset = 0usize;
        let mut seen = 0usize;
        let mut written = 0u64;

        loop {
            if cancel.is_cancelled() {
                debug!(offset, "decay sweep cancelled");
                break;
            }

            let page =
                memory_ops::decay_page(self.meta.as_ref(), offset, DECAY_PAGE_SIZE).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();

            // Compute the page's write set first, then apply it in one
            // transaction so a cancellation never splits a page.
            let mut updates = Vec::new();
            for row in &page {
                let days = now
                    .signed_duration_since(row.last_seen_at)
                    .num_milliseconds()
                    .max(0) as f64
                    / 86_400_000.0;
                let new_sal = (row.salience * retention_dual(days, &self.config)).clamp(0.0, 1.0);
                if (new_sal - row.salience).abs() > DECAY_WRITE_EPSILON {
                    updates.push((row.id.clone(), new_sal));
                }

                seen += 1;
                if seen % DECAY_YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
            }

            if !updates.is_empty() {
                let tx = self.meta.begin().await?;
                for (id, sal) in &updates {
                    memory_ops::update_salience(&tx, id, *sal, None).await?;
                }
                tx.commit().await?;
                written += updates.len() as u64;
            }
        }

        log_ops::finish_ops_entry(self.meta.as_ref(), &entry.id, written as i64, None).await?;
        info!(written, "decay sweep complete");
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use engram_core::context::SecurityContext;
    use engram_core::models::MemoryRecord;

    async fn seed(meta: &MetaStore, content: &str, days_old: i64, salience: f64) -> String {
        let mut m = MemoryRecord::new(content, Some("alice".into()));
        m.salience = salience;
        m.last_seen_at = Utc::now() - Duration::days(days_old);
        memory_ops::insert_memory(meta, &m).await.unwrap();
        m.id
    }

    #[tokio::test]
    async fn old_memories_lose_salience() {
        let meta = Arc::new(MetaStore::open_in_memory().await.unwrap());
        let old_id = seed(&meta, "old", 60, 0.8).await;
        let fresh_id = seed(&meta, "fresh", 0, 0.8).await;

        let sweep = DecaySweep::new(meta.clone(), DynamicsConfig::default());
        let written = sweep.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(written, 1);

        let ctx = SecurityContext::for_user("alice");
        let old = memory_ops::get_memory(meta.as_ref(), &ctx, false, &old_id)
            .await
            .unwrap()
            .unwrap();
        let fresh = memory_ops::get_memory(meta.as_ref(), &ctx, false, &fresh_id)
            .await
            .unwrap()
            .unwrap();
        assert!(old.salience < 0.8);
        // A fresh memory moves less than the write epsilon.
        assert!((fresh.salience - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cancelled_sweep_stops_cleanly() {
        let meta = Arc::new(MetaStore::open_in_memory().await.unwrap());
        seed(&meta, "a", 60, 0.8).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let sweep = DecaySweep::new(meta.clone(), DynamicsConfig::default());
        let written = sweep.run(&cancel).await.unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn sweep_writes_ops_log() {
        let meta = Arc::new(MetaStore::open_in_memory().await.unwrap());
        let sweep = DecaySweep::new(meta.clone(), DynamicsConfig::default());
        sweep.run(&CancellationToken::new()).await.unwrap();

        let rows = engram_storage::sql::SqlExecutor::all(
            meta.as_ref(),
            "SELECT op, finished_at FROM ops_log",
            &[],
        )
        .await
        .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].str("op").unwrap(), "decay");
        assert!(rows[0].opt_i64("finished_at").unwrap().is_some());
    }
}
