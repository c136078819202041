//! # engram
//!
//! The assembled memory engine. `Engram::open` wires the metadata
//! store, the vector backend, the embedding orchestrator, the
//! classifier, and the dynamics into one handle exposing the full
//! operation set: ingest, read, search, retrieve, reinforce, facts,
//! stats, and the maintenance lifecycle.

mod sink;

pub use engram_core::config::{self, EngramConfig};
pub use engram_core::errors::{EngramError, EngramResult};
pub use engram_core::models::{
    AddMemoryResult, EmbedLog, MemoryRecord, RetrievedMemory, SectorStats, TemporalEdge,
    TemporalFact, Waypoint,
};
pub use engram_core::{CancellationToken, SecurityContext, Sector};
pub use engram_vector::simhash64;

use std::sync::Arc;

use chrono::Utc;
use engram_classifier::{ClassifierCache, LinearModel, TrainSample};
use engram_core::config::VectorBackend;
use engram_core::constants::EMBED_LOG_STALL_SECS;
use engram_core::traits::VectorStore;
use engram_embeddings::EmbeddingOrchestrator;
use engram_ingest::IngestPipeline;
use engram_reflection::{MaintenanceScheduler, ReflectionEngine};
use engram_retrieval::RetrievalEngine;
use engram_storage::meta::MetaStore;
use engram_storage::queries::{classifier_ops, fact_ops, log_ops, memory_ops, stats, waypoint_ops};
use engram_storage::sql::to_millis;
use engram_storage::vector::{KvVectorStore, SqlVectorStore};
use tracing::info;

use crate::sink::MetaEmbedLogSink;

pub struct Engram {
    config: EngramConfig,
    meta: Arc<MetaStore>,
    vectors: Arc<dyn VectorStore>,
    orchestrator: Arc<EmbeddingOrchestrator>,
    classifier_cache: Arc<ClassifierCache>,
    pipeline: IngestPipeline,
    retrieval: RetrievalEngine,
    reflection: ReflectionEngine,
    scheduler: std::sync::Mutex<Option<MaintenanceScheduler>>,
}

impl Engram {
    /// Build the engine from configuration. Starts the maintenance
    /// scheduler when `auto_reflect` is on.
    pub async fn open(config: EngramConfig) -> EngramResult<Self> {
        let strict = config.storage.strict_tenant;
        let meta = Arc::new(MetaStore::open(&config.storage).await?);

        let vectors: Arc<dyn VectorStore> = match config.storage.vector_backend {
            VectorBackend::Sql => {
                Arc::new(SqlVectorStore::open(meta.clone(), strict).await?)
            }
            VectorBackend::KvIndex => {
                Arc::new(KvVectorStore::open(config.storage.path.as_deref(), strict)?)
            }
        };

        let orchestrator = Arc::new(EmbeddingOrchestrator::new(
            config.embed.clone(),
            config.vec_dim.0,
            Arc::new(MetaEmbedLogSink::new(meta.clone())),
        )?);

        let classifier_cache = Arc::new(ClassifierCache::new());
        let pipeline = IngestPipeline::new(
            meta.clone(),
            vectors.clone(),
            orchestrator.clone(),
            classifier_cache.clone(),
            config.dynamics.clone(),
            strict,
        );
        let retrieval = RetrievalEngine::new(meta.clone(), config.dynamics.clone(), strict);
        let reflection = ReflectionEngine::new(meta.clone(), config.reflect.clone());

        let engine = Self {
            meta: meta.clone(),
            vectors,
            orchestrator,
            classifier_cache,
            pipeline,
            retrieval,
            reflection,
            scheduler: std::sync::Mutex::new(None),
            config,
        };

        if engine.config.reflect.auto_reflect {
            engine.start_maintenance();
        }
        info!("engram engine ready");
        Ok(engine)
    }

    pub fn config(&self) -> &EngramConfig {
        &self.config
    }

    // ── Ingestion ─────────────────────────────────────────────────────

    pub async fn add_memory(
        &self,
        ctx: &SecurityContext,
        text: &str,
        tags: Vec<String>,
        metadata: serde_json::Value,
    ) -> EngramResult<AddMemoryResult> {
        self.pipeline.add_memory(ctx, text, tags, metadata).await
    }

    /// Update content/tags/metadata. The metadata argument replaces the
    /// stored object.
    pub async fn update_memory(
        &self,
        ctx: &SecurityContext,
        id: &str,
        content: Option<&str>,
        tags: Option<Vec<String>>,
        metadata: Option<serde_json::Value>,
    ) -> EngramResult<MemoryRecord> {
        self.pipeline.update_memory(ctx, id, content, tags, metadata).await
    }

    pub async fn delete_memory(&self, ctx: &SecurityContext, id: &str) -> EngramResult<()> {
        self.pipeline.delete_memory(ctx, id).await
    }

    /// Recall reinforcement with one hop of associative propagation.
    pub async fn reinforce(&self, ctx: &SecurityContext, id: &str) -> EngramResult<f64> {
        self.pipeline.reinforce(ctx, id).await
    }

    pub async fn record_feedback(
        &self,
        ctx: &SecurityContext,
        id: &str,
        delta: f64,
    ) -> EngramResult<f64> {
        self.pipeline.record_feedback(ctx, id, delta).await
    }

    // ── Reads ─────────────────────────────────────────────────────────

    /// Fetch one memory. Rows invisible to the caller read as absent.
    pub async fn get_memory(
        &self,
        ctx: &SecurityContext,
        id: &str,
    ) -> EngramResult<Option<MemoryRecord>> {
        memory_ops::get_memory(
            self.meta.as_ref(),
            ctx,
            self.config.storage.strict_tenant,
            id,
        )
        .await
    }

    pub async fn list_memories(
        &self,
        ctx: &SecurityContext,
        limit: usize,
        offset: usize,
    ) -> EngramResult<Vec<MemoryRecord>> {
        memory_ops::list_memories(
            self.meta.as_ref(),
            ctx,
            self.config.storage.strict_tenant,
            limit,
            offset,
        )
        .await
    }

    pub async fn count_memories(&self, ctx: &SecurityContext) -> EngramResult<u64> {
        memory_ops::count_memories(self.meta.as_ref(), ctx, self.config.storage.strict_tenant)
            .await
    }

    /// Keyword LIKE search over content.
    pub async fn search_keyword(
        &self,
        ctx: &SecurityContext,
        needle: &str,
        limit: usize,
    ) -> EngramResult<Vec<MemoryRecord>> {
        memory_ops::search_keyword(
            self.meta.as_ref(),
            ctx,
            self.config.storage.strict_tenant,
            needle,
            limit,
        )
        .await
    }

    /// The soft-dedup probe callers should use before hard inserts.
    pub async fn find_duplicate(
        &self,
        ctx: &SecurityContext,
        simhash: u64,
    ) -> EngramResult<Option<MemoryRecord>> {
        memory_ops::find_by_simhash(self.meta.as_ref(), ctx, simhash).await
    }

    /// Outgoing waypoints of a memory.
    pub async fn neighbours(
        &self,
        ctx: &SecurityContext,
        id: &str,
    ) -> EngramResult<Vec<Waypoint>> {
        waypoint_ops::neighbours(self.meta.as_ref(), ctx, id).await
    }

    pub async fn sector_stats(&self, ctx: &SecurityContext) -> EngramResult<Vec<SectorStats>> {
        stats::sector_stats(self.meta.as_ref(), ctx, self.config.storage.strict_tenant).await
    }

    // ── Retrieval ─────────────────────────────────────────────────────

    /// Embed the query text and retrieve.
    pub async fn retrieve(
        &self,
        ctx: &SecurityContext,
        query: &str,
        sector: Sector,
        max_energy: f64,
    ) -> EngramResult<Vec<RetrievedMemory>> {
        let query_vec = self.orchestrator.embed_query(query, sector).await?;
        self.retrieval.retrieve(ctx, &query_vec, sector, max_energy).await
    }

    /// Retrieve with a caller-supplied query vector.
    pub async fn retrieve_with_vector(
        &self,
        ctx: &SecurityContext,
        query_vec: &[f32],
        sector: Sector,
        max_energy: f64,
    ) -> EngramResult<Vec<RetrievedMemory>> {
        self.retrieval.retrieve(ctx, query_vec, sector, max_energy).await
    }

    // ── Temporal facts ────────────────────────────────────────────────

    pub async fn add_fact(&self, ctx: &SecurityContext, fact: &TemporalFact) -> EngramResult<()> {
        ctx.ensure_acting_for(fact.user_id.as_deref())?;
        fact_ops::insert_fact(self.meta.as_ref(), fact).await
    }

    /// Close an open validity window.
    pub async fn close_fact(&self, ctx: &SecurityContext, id: &str) -> EngramResult<()> {
        fact_ops::close_fact(self.meta.as_ref(), ctx, id, to_millis(Utc::now())).await
    }

    pub async fn query_facts(
        &self,
        ctx: &SecurityContext,
        subject: Option<&str>,
        predicate: Option<&str>,
        at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> EngramResult<Vec<TemporalFact>> {
        fact_ops::query_facts(
            self.meta.as_ref(),
            ctx,
            self.config.storage.strict_tenant,
            subject,
            predicate,
            at.map(to_millis),
        )
        .await
    }

    pub async fn add_fact_edge(&self, edge: &TemporalEdge) -> EngramResult<()> {
        fact_ops::insert_edge(self.meta.as_ref(), edge).await
    }

    pub async fn edges_for_fact(&self, fact_id: &str) -> EngramResult<Vec<TemporalEdge>> {
        fact_ops::edges_for_fact(self.meta.as_ref(), fact_id).await
    }

    // ── Classifier ────────────────────────────────────────────────────

    /// Retrain the user's sector classifier from their stored mean
    /// vectors. Returns the new model version.
    pub async fn train_classifier(&self, ctx: &SecurityContext, user: &str) -> EngramResult<i64> {
        ctx.ensure_acting_for(Some(user))?;

        let user_ctx = SecurityContext::for_user(user);
        let memories = memory_ops::list_memories(
            self.meta.as_ref(),
            &user_ctx,
            self.config.storage.strict_tenant,
            1_000,
            0,
        )
        .await?;

        let dim = self.config.vec_dim.0;
        let samples: Vec<TrainSample> = memories
            .into_iter()
            .filter_map(|m| {
                let v = m.mean_vec?;
                (v.len() == dim).then(|| TrainSample {
                    vector: v,
                    label: m.primary_sector,
                })
            })
            .collect();

        let prior = classifier_ops::get_model(self.meta.as_ref(), user)
            .await?
            .map(|r| LinearModel::from_record(&r));
        let model = engram_classifier::train(&samples, prior, 0.01, 10).await?;

        classifier_ops::upsert_model(self.meta.as_ref(), &model.to_record(user)).await?;
        self.classifier_cache.invalidate(user);
        self.classifier_cache.put(user, Arc::new(model.clone()));
        Ok(model.version)
    }

    // ── Maintenance ───────────────────────────────────────────────────

    /// Run one decay sweep now.
    pub async fn run_decay(&self, cancel: &CancellationToken) -> EngramResult<u64> {
        engram_dynamics::DecaySweep::new(self.meta.clone(), self.config.dynamics.clone())
            .run(cancel)
            .await
    }

    /// Run one reflection pass now.
    pub async fn run_reflection(&self, cancel: &CancellationToken) -> EngramResult<usize> {
        self.reflection.reflect(cancel).await
    }

    /// Prune weak waypoints now.
    pub async fn prune_waypoints(&self) -> EngramResult<u64> {
        self.reflection.prune_waypoints().await
    }

    /// Pending embed-log rows older than the stall timeout. Operator
    /// visibility only; the core never auto-recovers them.
    pub async fn stalled_embed_logs(&self, ctx: &SecurityContext) -> EngramResult<Vec<EmbedLog>> {
        if !ctx.admin {
            return Err(EngramError::forbidden("embed log inspection is admin-only"));
        }
        let cutoff = to_millis(Utc::now()) - (EMBED_LOG_STALL_SECS as i64) * 1_000;
        log_ops::stalled_embed_logs(self.meta.as_ref(), cutoff).await
    }

    /// Start the scheduler. Idempotent: a running scheduler stays.
    pub fn start_maintenance(&self) {
        let mut slot = self.scheduler.lock().unwrap();
        if slot.is_none() {
            *slot = Some(MaintenanceScheduler::start(
                self.meta.clone(),
                self.config.dynamics.clone(),
                self.config.reflect.clone(),
            ));
        }
    }

    /// Stop background work and flush buffered vector writes.
    pub async fn shutdown(&self) -> EngramResult<()> {
        if let Some(mut scheduler) = self.scheduler.lock().unwrap().take() {
            scheduler.stop();
        }
        self.vectors.flush().await?;
        info!("engram engine shut down");
        Ok(())
    }
}
