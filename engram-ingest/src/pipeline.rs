//! The ingestion pipeline: add, update, delete, reinforce.
//!
//! Persistence order upholds atomicity without cross-backend
//! transactions: vector writes land first (an upsert is harmless to
//! retry), then the metadata transaction commits the row, the embed-log
//! linkage, and the waypoints; a metadata failure compensates by
//! removing the vectors it wrote. No path leaves a memory row without
//! its vectors.

use std::sync::Arc;

use chrono::Utc;
use engram_classifier::{ClassifierCache, LinearModel, Prediction};
use engram_core::config::DynamicsConfig;
use engram_core::context::SecurityContext;
use engram_core::errors::{EngramError, EngramResult};
use engram_core::models::{AddMemoryResult, MemoryRecord};
use engram_core::sector::Sector;
use engram_core::traits::{SectorVector, VectorStore};
use engram_embeddings::EmbeddingOrchestrator;
use engram_dynamics::salience::{propagate, trace_reinforce};
use engram_storage::meta::MetaStore;
use engram_storage::queries::{classifier_ops, memory_ops, waypoint_ops};
use engram_storage::sql::to_millis;
use engram_vector::simhash::simhash64;
use tracing::{debug, info, warn};

use crate::chunker::chunk_text;
use crate::linker::discover_links;

pub struct IngestPipeline {
    meta: Arc<MetaStore>,
    vectors: Arc<dyn VectorStore>,
    orchestrator: Arc<EmbeddingOrchestrator>,
    classifier_cache: Arc<ClassifierCache>,
    dynamics: DynamicsConfig,
    strict_tenant: bool,
}

impl IngestPipeline {
    pub fn new(
        meta: Arc<MetaStore>,
        vectors: Arc<dyn VectorStore>,
        orchestrator: Arc<EmbeddingOrchestrator>,
        classifier_cache: Arc<ClassifierCache>,
        dynamics: DynamicsConfig,
        strict_tenant: bool,
    ) -> Self {
        Self {
            meta,
            vectors,
            orchestrator,
            classifier_cache,
            dynamics,
            strict_tenant,
        }
    }

    /// Ingest a new memory.
    ///
    /// Near-duplicates (same user, same simhash) return the existing row
    /// untouched — salience is not reset by re-adding the same text.
    pub async fn add_memory(
        &self,
        ctx: &SecurityContext,
        text: &str,
        tags: Vec<String>,
        metadata: serde_json::Value,
    ) -> EngramResult<AddMemoryResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngramError::bad_request("content must not be empty"));
        }
        let user_id = ctx.user_id.clone();

        // Soft de-duplication by similarity hash.
        let simhash = simhash64(text);
        if let Some(existing) =
            memory_ops::find_by_simhash(self.meta.as_ref(), ctx, simhash).await?
        {
            debug!(id = %existing.id, "simhash dedup hit");
            return Ok(AddMemoryResult {
                id: existing.id,
                primary_sector: existing.primary_sector,
                sectors: existing.sectors,
                deduplicated: true,
            });
        }

        // Chunk, embed, classify.
        let chunks = chunk_text(text);
        let requested = requested_sectors(&metadata);
        let mut record = MemoryRecord::new(text, user_id.clone());
        record.decay_lambda = self.dynamics.default_lambda;
        record.simhash = simhash;
        record.tags = tags;
        record.metadata = metadata;
        record.segment = record.created_at.timestamp() / (86_400 * 30);

        let embedding = self
            .orchestrator
            .embed_multi_sector(
                Some(&record.id),
                text,
                &requested,
                Some(&chunks),
                user_id.as_deref(),
            )
            .await?;

        let semantic_vec = embedding
            .vectors
            .get(&Sector::Semantic)
            .or_else(|| requested.first().and_then(|s| embedding.vectors.get(s)))
            .cloned();
        let prediction = self
            .classify(user_id.as_deref(), semantic_vec.as_deref())
            .await;

        let embedded: Vec<Sector> = requested
            .iter()
            .copied()
            .filter(|s| embedding.vectors.contains_key(s))
            .collect();
        let (primary, additional) = intersect_sectors(&prediction, &embedded);
        record.primary_sector = primary;
        record.sectors = additional;
        record.mean_vec = embedding.vectors.get(&primary).cloned();
        record.mean_dim = record.mean_vec.as_ref().map(|v| v.len());

        // Vectors first; compensate if the metadata transaction fails.
        for (&sector, v) in &embedding.vectors {
            self.vectors
                .store(
                    ctx,
                    SectorVector {
                        memory_id: record.id.clone(),
                        sector,
                        user_id: user_id.clone(),
                        v: v.clone(),
                    },
                )
                .await?;
        }

        let links = discover_links(
            self.vectors.as_ref(),
            ctx,
            &self.dynamics,
            &record.id,
            user_id.as_deref(),
            semantic_vec.as_deref(),
            embedding.vectors.get(&Sector::Emotional).map(|v| v.as_slice()),
        )
        .await?;

        let persisted: EngramResult<()> = async {
            let tx = self.meta.begin().await?;
            memory_ops::insert_memory(&tx, &record).await?;
            for link in &links {
                // Association is mutual: both directions get an edge so
                // either memory spreads activation to the other.
                waypoint_ops::upsert_waypoint(&tx, link).await?;
                let mut back = link.clone();
                std::mem::swap(&mut back.src_id, &mut back.dst_id);
                waypoint_ops::upsert_waypoint(&tx, &back).await?;
            }
            tx.commit().await?;
            Ok(())
        }
        .await;

        if let Err(e) = persisted {
            // Roll the vector writes back so nothing orphans.
            if let Err(cleanup) = self.vectors.delete_all(ctx, &record.id).await {
                warn!(id = %record.id, error = %cleanup, "vector cleanup after failed insert");
            }
            return Err(e);
        }

        info!(
            id = %record.id,
            primary = %record.primary_sector,
            links = links.len(),
            degraded = embedding.degraded,
            "memory ingested"
        );
        Ok(AddMemoryResult {
            id: record.id,
            primary_sector: record.primary_sector,
            sectors: record.sectors,
            deduplicated: false,
        })
    }

    /// Update content, tags, and/or metadata.
    ///
    /// The metadata argument REPLACES the stored object (no merge).
    /// A content change re-chunks, re-embeds, and replaces every sector
    /// vector; tags/metadata-only changes touch columns only. Either
    /// path increments the version.
    pub async fn update_memory(
        &self,
        ctx: &SecurityContext,
        id: &str,
        content: Option<&str>,
        tags: Option<Vec<String>>,
        metadata: Option<serde_json::Value>,
    ) -> EngramResult<MemoryRecord> {
        let mut record = memory_ops::get_memory(self.meta.as_ref(), ctx, self.strict_tenant, id)
            .await?
            .ok_or_else(|| EngramError::not_found("memory", id))?;
        ctx.ensure_can_write(record.user_id.as_deref())?;

        let new_content = content
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != record.content);

        if let Some(text) = new_content {
            let chunks = chunk_text(text);
            let requested = requested_sectors(&record.metadata);
            let embedding = self
                .orchestrator
                .embed_multi_sector(
                    Some(&record.id),
                    text,
                    &requested,
                    Some(&chunks),
                    record.user_id.as_deref(),
                )
                .await?;

            // Upsert the new vectors, then drop sectors that vanished,
            // so the row never exists without vectors.
            for (&sector, v) in &embedding.vectors {
                self.vectors
                    .store(
                        ctx,
                        SectorVector {
                            memory_id: record.id.clone(),
                            sector,
                            user_id: record.user_id.clone(),
                            v: v.clone(),
                        },
                    )
                    .await?;
            }
            for sector in Sector::ALL {
                if !embedding.vectors.contains_key(&sector) {
                    self.vectors.delete(ctx, &record.id, sector).await?;
                }
            }

            record.content = text.to_string();
            record.simhash = simhash64(text);
            record.mean_vec = embedding.vectors.get(&record.primary_sector).cloned();
            record.mean_dim = record.mean_vec.as_ref().map(|v| v.len());
        }

        if let Some(t) = tags {
            record.tags = t;
        }
        if let Some(m) = metadata {
            record.metadata = m;
        }
        record.version += 1;
        record.updated_at = Utc::now();

        let tx = self.meta.begin().await?;
        memory_ops::update_memory(&tx, &record).await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Delete a memory, its vectors, and every waypoint touching it.
    pub async fn delete_memory(&self, ctx: &SecurityContext, id: &str) -> EngramResult<()> {
        let record = memory_ops::get_memory(self.meta.as_ref(), ctx, self.strict_tenant, id)
            .await?
            .ok_or_else(|| EngramError::not_found("memory", id))?;
        ctx.ensure_can_write(record.user_id.as_deref())?;

        let tx = self.meta.begin().await?;
        waypoint_ops::delete_for_memory(&tx, id).await?;
        memory_ops::delete_memory(&tx, id).await?;
        tx.commit().await?;

        // Vectors go last: a failure here leaves invisible blobs, never
        // a dangling row.
        if let Err(e) = self.vectors.delete_all(ctx, id).await {
            warn!(id, error = %e, "vector cleanup after delete");
        }
        Ok(())
    }

    /// Recall reinforcement: bump salience toward 1, touch last_seen,
    /// and propagate one associative hop to direct neighbours.
    pub async fn reinforce(&self, ctx: &SecurityContext, id: &str) -> EngramResult<f64> {
        let record = memory_ops::get_memory(self.meta.as_ref(), ctx, self.strict_tenant, id)
            .await?
            .ok_or_else(|| EngramError::not_found("memory", id))?;
        ctx.ensure_can_write(record.user_id.as_deref())
            .or_else(|_| ctx.ensure_can_read(record.user_id.as_deref()))?;

        let now = Utc::now();
        let new_sal = trace_reinforce(record.salience, &self.dynamics);

        let neighbours = waypoint_ops::neighbours(self.meta.as_ref(), ctx, id).await?;
        let targets: Vec<String> = neighbours.iter().map(|w| w.dst_id.clone()).collect();
        let target_records =
            memory_ops::fetch_by_ids(self.meta.as_ref(), ctx, self.strict_tenant, &targets).await?;

        let tx = self.meta.begin().await?;
        memory_ops::update_salience(&tx, id, new_sal, Some(to_millis(now))).await?;
        for wp in &neighbours {
            if let Some(target) = target_records.iter().find(|m| m.id == wp.dst_id) {
                let bumped = propagate(target.salience, new_sal, wp.weight, &self.dynamics);
                memory_ops::update_salience(&tx, &target.id, bumped, None).await?;
            }
            let new_weight =
                (wp.weight + self.dynamics.eta_reinforcement * (1.0 - wp.weight)).min(1.0);
            waypoint_ops::reinforce_waypoint(
                &tx,
                &wp.src_id,
                &wp.dst_id,
                wp.user_id.as_deref(),
                new_weight,
                to_millis(now),
            )
            .await?;
        }
        tx.commit().await?;

        debug!(id, salience = new_sal, neighbours = neighbours.len(), "reinforced");
        Ok(new_sal)
    }

    /// Adjust the explicit feedback score, clamped to [-1, 1].
    pub async fn record_feedback(
        &self,
        ctx: &SecurityContext,
        id: &str,
        delta: f64,
    ) -> EngramResult<f64> {
        let record = memory_ops::get_memory(self.meta.as_ref(), ctx, self.strict_tenant, id)
            .await?
            .ok_or_else(|| EngramError::not_found("memory", id))?;
        ctx.ensure_can_write(record.user_id.as_deref())?;

        let score = (record.feedback_score + delta).clamp(-1.0, 1.0);
        memory_ops::update_feedback(self.meta.as_ref(), id, score).await?;
        Ok(score)
    }

    /// Predict sectors for a vector under the user's model. Missing
    /// model or any prediction failure degrades to the semantic default.
    async fn classify(&self, user_id: Option<&str>, vector: Option<&[f32]>) -> Prediction {
        let (Some(user), Some(v)) = (user_id, vector) else {
            return Prediction::default_semantic();
        };

        let model = match self.classifier_cache.get(user) {
            Some(m) => Some(m),
            None => match classifier_ops::get_model(self.meta.as_ref(), user).await {
                Ok(Some(record)) => {
                    let model = Arc::new(LinearModel::from_record(&record));
                    self.classifier_cache.put(user, model.clone());
                    Some(model)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(user, error = %e, "classifier model load failed");
                    None
                }
            },
        };

        match model {
            Some(m) => m.predict(v).unwrap_or_else(|e| {
                debug!(user, error = %e, "prediction degraded to semantic");
                Prediction::default_semantic()
            }),
            None => Prediction::default_semantic(),
        }
    }
}

/// Sectors requested via `metadata.sectors`, defaulting to all five.
fn requested_sectors(metadata: &serde_json::Value) -> Vec<Sector> {
    let from_meta: Option<Vec<Sector>> = metadata.get("sectors").and_then(|v| {
        let names = v.as_array()?;
        let parsed: Vec<Sector> = names
            .iter()
            .filter_map(|n| n.as_str())
            .filter_map(Sector::parse)
            .collect();
        if parsed.is_empty() {
            None
        } else {
            Some(parsed)
        }
    });
    from_meta.unwrap_or_else(|| Sector::ALL.to_vec())
}

/// Reconcile the classifier's opinion with the sectors actually
/// embedded: the primary must carry a vector, and the additional list
/// keeps only embedded sectors.
fn intersect_sectors(prediction: &Prediction, embedded: &[Sector]) -> (Sector, Vec<Sector>) {
    let primary = if embedded.contains(&prediction.primary) {
        prediction.primary
    } else if embedded.contains(&Sector::Semantic) {
        Sector::Semantic
    } else {
        embedded.first().copied().unwrap_or(Sector::Semantic)
    };

    let additional: Vec<Sector> = prediction
        .additional
        .iter()
        .copied()
        .filter(|s| *s != primary && embedded.contains(s))
        .collect();
    (primary, additional)
}
