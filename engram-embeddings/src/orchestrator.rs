//! The multi-sector embedding orchestrator.
//!
//! One entry point (`embed_multi_sector`) that writes the pending log
//! row, routes text to the configured provider in the configured mode,
//! retries with backoff, falls back to the synthetic embedder on
//! terminal failure, and always hands vectors back so ingestion never
//! fails because a provider is down.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use engram_core::config::{EmbedConfig, EmbedMode, Tier};
use engram_core::errors::{EmbeddingError, EngramResult};
use engram_core::models::{EmbedLog, EmbedLogStatus};
use engram_core::sector::Sector;
use engram_core::traits::{EmbedLogSink, EmbeddingProvider};
use engram_vector::ops::{compress, fuse, mean, resize};
use tracing::{debug, info, warn};

use crate::backoff::RetryPolicy;
use crate::providers;
use crate::synthetic::SyntheticEmbedder;

/// Dimension the provider vector is compressed to before fusion at tier
/// smart/hybrid. Bounded by half the target so the synthetic half always
/// keeps the majority of the lanes.
const FUSE_SEM_DIM: usize = 128;

/// What `embed_multi_sector` returns.
#[derive(Debug, Clone)]
pub struct MultiSectorEmbedding {
    /// One vector per requested sector, all at the configured dimension.
    pub vectors: HashMap<Sector, Vec<f32>>,
    /// The embed-log row this batch wrote.
    pub log_id: String,
    /// True when the provider failed terminally and the synthetic
    /// fallback produced the vectors.
    pub degraded: bool,
}

pub struct EmbeddingOrchestrator {
    synthetic: SyntheticEmbedder,
    provider: Box<dyn EmbeddingProvider>,
    config: EmbedConfig,
    dim: usize,
    retry: RetryPolicy,
    sink: Arc<dyn EmbedLogSink>,
}

impl EmbeddingOrchestrator {
    /// Build from configuration. Fails only on an unusable provider
    /// setup (remote kind without a base URL).
    pub fn new(
        config: EmbedConfig,
        dim: usize,
        sink: Arc<dyn EmbedLogSink>,
    ) -> EngramResult<Self> {
        let provider = providers::create_provider(&config, dim)?;
        info!(
            provider = provider.name(),
            tier = ?config.tier,
            mode = ?config.mode,
            dim,
            "embedding orchestrator initialized"
        );
        Ok(Self {
            synthetic: SyntheticEmbedder::new(),
            provider,
            config,
            dim,
            retry: RetryPolicy::default(),
            sink,
        })
    }

    /// Retry schedule override for tests.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The model label recorded in embed-log rows.
    pub fn model_label(&self) -> &str {
        match self.config.tier {
            Tier::Fast => "synthetic",
            _ => self.provider.name(),
        }
    }

    /// Embed `text` (or its chunks) for every requested sector.
    ///
    /// Writes a pending log row up front, marks it completed on success
    /// or failed (with the error text) after the synthetic fallback.
    /// Either way the returned map has one vector per sector at the
    /// configured dimension — upstream writes always succeed.
    pub async fn embed_multi_sector(
        &self,
        memory_id: Option<&str>,
        text: &str,
        sectors: &[Sector],
        chunks: Option<&[String]>,
        _user_id: Option<&str>,
    ) -> EngramResult<MultiSectorEmbedding> {
        let log = EmbedLog::pending(memory_id.map(String::from), self.model_label());
        self.sink.log_pending(&log).await?;

        let owned_chunks: Vec<String> = match chunks {
            Some(cs) if cs.len() > 1 => cs.to_vec(),
            _ => vec![text.to_string()],
        };

        match self.compute(&owned_chunks, sectors).await {
            Ok(vectors) => {
                self.terminal(&log.id, EmbedLogStatus::Completed, None).await;
                Ok(MultiSectorEmbedding {
                    vectors,
                    log_id: log.id,
                    degraded: false,
                })
            }
            Err(e) => {
                warn!(error = %e, "provider failed terminally, falling back to synthetic");
                let vectors = self.synthetic_all(&owned_chunks, sectors)?;
                self.terminal(&log.id, EmbedLogStatus::Failed, Some(&e.to_string()))
                    .await;
                Ok(MultiSectorEmbedding {
                    vectors,
                    log_id: log.id,
                    degraded: true,
                })
            }
        }
    }

    /// Embed a single query string for one sector. No log row: query
    /// vectors are ephemeral.
    pub async fn embed_query(&self, text: &str, sector: Sector) -> EngramResult<Vec<f32>> {
        let chunks = vec![text.to_string()];
        match self.compute(&chunks, &[sector]).await {
            Ok(mut vectors) => Ok(vectors.remove(&sector).unwrap_or_default()),
            Err(e) => {
                debug!(error = %e, "query embedding degraded to synthetic");
                Ok(self.synthetic.embed(text, sector, self.dim))
            }
        }
    }

    /// The configured target dimension.
    pub fn dimensions(&self) -> usize {
        self.dim
    }

    async fn terminal(&self, id: &str, status: EmbedLogStatus, error: Option<&str>) {
        if let Err(e) = self.sink.log_terminal(id, status, error).await {
            warn!(log_id = %id, error = %e, "failed to update embed log");
        }
    }

    /// Tier routing. Chunks are embedded independently and aggregated by
    /// elementwise mean.
    async fn compute(
        &self,
        chunks: &[String],
        sectors: &[Sector],
    ) -> Result<HashMap<Sector, Vec<f32>>, EmbeddingError> {
        match self.config.tier {
            Tier::Fast => self
                .synthetic_all(chunks, sectors)
                .map_err(|e| EmbeddingError::InvalidResponse {
                    reason: e.to_string(),
                }),
            Tier::Standard => self.provider_all(chunks, sectors).await,
            Tier::Smart | Tier::Hybrid => {
                if !self.config.hybrid_fusion {
                    return self.provider_all(chunks, sectors).await;
                }
                self.fused_all(chunks, sectors).await
            }
        }
    }

    /// Synthetic vectors for every sector, resized to the target dim.
    fn synthetic_all(
        &self,
        chunks: &[String],
        sectors: &[Sector],
    ) -> EngramResult<HashMap<Sector, Vec<f32>>> {
        let mut out = HashMap::new();
        for &sector in sectors {
            let per_chunk: Vec<Vec<f32>> = chunks
                .iter()
                .map(|c| self.synthetic.embed(c, sector, self.dim))
                .collect();
            out.insert(sector, mean(&per_chunk)?);
        }
        Ok(out)
    }

    /// Provider vectors for every sector, chunk-meaned and resized.
    async fn provider_all(
        &self,
        chunks: &[String],
        sectors: &[Sector],
    ) -> Result<HashMap<Sector, Vec<f32>>, EmbeddingError> {
        // per_sector[i] collects one vector per chunk.
        let mut per_sector: Vec<Vec<Vec<f32>>> = vec![Vec::new(); sectors.len()];
        for chunk in chunks {
            let vecs = self.provider_chunk(chunk, sectors).await?;
            for (i, v) in vecs.into_iter().enumerate() {
                per_sector[i].push(resize(&v, self.dim));
            }
        }

        let mut out = HashMap::new();
        for (i, &sector) in sectors.iter().enumerate() {
            let m = mean(&per_sector[i]).map_err(|e| EmbeddingError::InvalidResponse {
                reason: e.to_string(),
            })?;
            out.insert(sector, m);
        }
        Ok(out)
    }

    /// Tier smart/hybrid: synthetic ⧺ compressed provider vector, fused
    /// so the result lands exactly on the target dimension.
    async fn fused_all(
        &self,
        chunks: &[String],
        sectors: &[Sector],
    ) -> Result<HashMap<Sector, Vec<f32>>, EmbeddingError> {
        let sem_dim = FUSE_SEM_DIM.min(self.dim / 2);
        let syn_dim = self.dim - sem_dim;

        let mut out = HashMap::new();
        for (i, &sector) in sectors.iter().enumerate() {
            let mut fused_chunks = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let provider_vecs = self.provider_chunk(chunk, &sectors[i..=i]).await?;
                let sem = compress(&provider_vecs[0], sem_dim);
                let syn = self.synthetic.embed(chunk, sector, syn_dim);
                fused_chunks.push(fuse(&syn, &sem));
            }
            let m = mean(&fused_chunks).map_err(|e| EmbeddingError::InvalidResponse {
                reason: e.to_string(),
            })?;
            out.insert(sector, resize(&m, self.dim));
        }
        Ok(out)
    }

    /// One chunk through the provider: one vector per sector, in the
    /// configured mode, each call retried with backoff.
    async fn provider_chunk(
        &self,
        chunk: &str,
        sectors: &[Sector],
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let inputs: Vec<String> = sectors
            .iter()
            .map(|s| format!("{}: {chunk}", s.as_str()))
            .collect();

        let batch_ok = self.config.mode == EmbedMode::Simple && self.provider.supports_batch();
        if batch_ok {
            return self
                .retry
                .run("embed_batch", || self.provider.embed_batch(&inputs))
                .await;
        }

        // Advanced mode: one request per sector.
        if self.config.advanced_parallel && self.provider.parallel_safe() {
            let futs = inputs
                .iter()
                .map(|input| self.retry.run("embed", || self.provider.embed(input)));
            return futures::future::try_join_all(futs).await;
        }

        let mut out = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.iter().enumerate() {
            if i > 0 && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
            out.push(self.retry.run("embed", || self.provider.embed(input)).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::traits::NullEmbedLogSink;
    use engram_vector::ops::norm;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Sink that records every status transition.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl EmbedLogSink for RecordingSink {
        async fn log_pending(&self, log: &EmbedLog) -> EngramResult<()> {
            self.events
                .lock()
                .unwrap()
                .push((log.id.clone(), "pending".into()));
            Ok(())
        }

        async fn log_terminal(
            &self,
            id: &str,
            status: EmbedLogStatus,
            _error: Option<&str>,
        ) -> EngramResult<()> {
            self.events
                .lock()
                .unwrap()
                .push((id.to_string(), status.as_str().into()));
            Ok(())
        }
    }

    /// Provider that always rate-limits.
    struct RateLimitedProvider {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for RateLimitedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EmbeddingError::RateLimited {
                retry_after_ms: Some(0),
            })
        }

        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EmbeddingError::RateLimited {
                retry_after_ms: Some(0),
            })
        }

        fn dimensions(&self) -> usize {
            64
        }

        fn name(&self) -> &str {
            "always-429"
        }
    }

    fn orchestrator(config: EmbedConfig, dim: usize) -> EmbeddingOrchestrator {
        EmbeddingOrchestrator::new(config, dim, Arc::new(NullEmbedLogSink))
            .unwrap()
            .with_retry_policy(RetryPolicy::with_schedule([0, 0, 0]))
    }

    #[tokio::test]
    async fn fast_tier_embeds_all_sectors() {
        let orch = orchestrator(EmbedConfig::default(), 128);
        let out = orch
            .embed_multi_sector(None, "hello world", &Sector::ALL, None, None)
            .await
            .unwrap();
        assert_eq!(out.vectors.len(), 5);
        assert!(!out.degraded);
        for v in out.vectors.values() {
            assert_eq!(v.len(), 128);
            assert!((norm(v) - 1.0).abs() < 1e-3);
        }
    }

    #[tokio::test]
    async fn chunked_input_is_meaned() {
        let orch = orchestrator(EmbedConfig::default(), 64);
        let chunks = vec!["first chunk".to_string(), "second chunk".to_string()];
        let out = orch
            .embed_multi_sector(
                None,
                "ignored when chunks given",
                &[Sector::Semantic],
                Some(&chunks),
                None,
            )
            .await
            .unwrap();
        let v = &out.vectors[&Sector::Semantic];
        assert_eq!(v.len(), 64);
    }

    #[tokio::test]
    async fn terminal_failure_falls_back_and_marks_log_failed() {
        let sink = Arc::new(RecordingSink::default());
        let config = EmbedConfig {
            tier: Tier::Standard,
            ..Default::default()
        };
        let provider = RateLimitedProvider {
            calls: AtomicU32::new(0),
        };
        let mut orch = EmbeddingOrchestrator::new(config, 32, sink.clone())
            .unwrap()
            .with_retry_policy(RetryPolicy::with_schedule([0, 0, 0]));
        orch.provider = Box::new(provider);

        let out = orch
            .embed_multi_sector(Some("m1"), "hello", &Sector::ALL, None, Some("alice"))
            .await
            .unwrap();

        // Ingestion still gets five usable vectors.
        assert!(out.degraded);
        assert_eq!(out.vectors.len(), 5);
        for v in out.vectors.values() {
            assert_eq!(v.len(), 32);
        }

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].1, "pending");
        assert_eq!(events[1].1, "failed");
        assert_eq!(events[0].0, events[1].0);
    }

    #[tokio::test]
    async fn query_embedding_has_target_dim() {
        let orch = orchestrator(EmbedConfig::default(), 96);
        let v = orch.embed_query("what is rust", Sector::Semantic).await.unwrap();
        assert_eq!(v.len(), 96);
    }
}
