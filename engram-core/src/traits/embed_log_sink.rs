use crate::errors::EngramResult;
use crate::models::{EmbedLog, EmbedLogStatus};

/// Where the embedding orchestrator writes its status rows.
///
/// The metadata store is the production sink; tests substitute a
/// recorder. Terminal states are absorbing — a sink may reject a second
/// terminal write but must never resurrect a completed or failed row.
#[async_trait::async_trait]
pub trait EmbedLogSink: Send + Sync {
    /// Record a new pending batch.
    async fn log_pending(&self, log: &EmbedLog) -> EngramResult<()>;

    /// Move a pending row to `completed` or `failed`.
    async fn log_terminal(
        &self,
        id: &str,
        status: EmbedLogStatus,
        error: Option<&str>,
    ) -> EngramResult<()>;
}

/// Sink that drops everything. For callers that embed outside an
/// ingestion context (ad-hoc query vectors).
pub struct NullEmbedLogSink;

#[async_trait::async_trait]
impl EmbedLogSink for NullEmbedLogSink {
    async fn log_pending(&self, _log: &EmbedLog) -> EngramResult<()> {
        Ok(())
    }

    async fn log_terminal(
        &self,
        _id: &str,
        _status: EmbedLogStatus,
        _error: Option<&str>,
    ) -> EngramResult<()> {
        Ok(())
    }
}
