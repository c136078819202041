//! The production embed-log sink: rows in the metadata store.

use std::sync::Arc;

use engram_core::errors::EngramResult;
use engram_core::models::{EmbedLog, EmbedLogStatus};
use engram_core::traits::EmbedLogSink;
use engram_storage::meta::MetaStore;
use engram_storage::queries::log_ops;

pub struct MetaEmbedLogSink {
    meta: Arc<MetaStore>,
}

impl MetaEmbedLogSink {
    pub fn new(meta: Arc<MetaStore>) -> Self {
        Self { meta }
    }
}

#[async_trait::async_trait]
impl EmbedLogSink for MetaEmbedLogSink {
    async fn log_pending(&self, log: &EmbedLog) -> EngramResult<()> {
        log_ops::insert_embed_log(self.meta.as_ref(), log).await
    }

    async fn log_terminal(
        &self,
        id: &str,
        status: EmbedLogStatus,
        error: Option<&str>,
    ) -> EngramResult<()> {
        log_ops::mark_embed_log(self.meta.as_ref(), id, status, error).await?;
        Ok(())
    }
}
