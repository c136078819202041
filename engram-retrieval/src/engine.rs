//! RetrievalEngine: the full scoring pipeline.
//!
//! Stage 1: candidate gather (salience > 0.01, tenant-scoped).
//! Stage 2: resonance-weighted cosine × salience.
//! Stage 3: spreading activation from the top seeds.
//! Stage 4: energy threshold cut, batch content fetch.

use std::collections::HashMap;
use std::sync::Arc;

use engram_core::context::SecurityContext;
use engram_core::errors::EngramResult;
use engram_core::models::RetrievedMemory;
use engram_core::sector::Sector;
use engram_dynamics::resonance::cross_sector;
use engram_dynamics::salience::threshold;
use engram_storage::meta::MetaStore;
use engram_storage::queries::memory_ops;
use engram_vector::ops::cosine;
use tracing::{debug, info};

use crate::activation::spreading_activation;

/// Candidates that seed the activation spread.
const SEED_COUNT: usize = 5;
/// Hops of diffusion.
const MAX_HOPS: usize = 3;
/// How much spread energy adds to the base score.
const SPREAD_WEIGHT: f64 = 0.3;

pub struct RetrievalEngine {
    meta: Arc<MetaStore>,
    config: engram_core::config::DynamicsConfig,
    strict_tenant: bool,
}

impl RetrievalEngine {
    pub fn new(
        meta: Arc<MetaStore>,
        config: engram_core::config::DynamicsConfig,
        strict_tenant: bool,
    ) -> Self {
        Self {
            meta,
            config,
            strict_tenant,
        }
    }

    /// Retrieve memories for a query vector in a sector.
    ///
    /// `max_energy` is the τ of the threshold equation: the bar every
    /// returned memory's combined score must clear.
    pub async fn retrieve(
        &self,
        ctx: &SecurityContext,
        query_vec: &[f32],
        query_sector: Sector,
        max_energy: f64,
    ) -> EngramResult<Vec<RetrievedMemory>> {
        // Stage 1: candidates.
        let candidates =
            memory_ops::candidates(self.meta.as_ref(), ctx, self.strict_tenant).await?;
        if candidates.is_empty() {
            debug!("no candidates above the salience floor");
            return Ok(Vec::new());
        }

        // Stage 2: base scores.
        let mut scored: Vec<(String, f64)> = Vec::with_capacity(candidates.len());
        for c in &candidates {
            let Some(mean_vec) = &c.mean_vec else {
                continue;
            };
            if mean_vec.len() != query_vec.len() {
                continue;
            }
            let bs = cosine(query_vec, mean_vec)? as f64;
            let cs = cross_sector(c.primary_sector, query_sector, bs);
            scored.push((c.id.clone(), cs * c.salience));
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        // Stage 3: spread from the best seeds.
        let seeds: Vec<String> = scored
            .iter()
            .take(SEED_COUNT)
            .map(|(id, _)| id.clone())
            .collect();
        let spread = spreading_activation(
            self.meta.as_ref(),
            ctx,
            &seeds,
            MAX_HOPS,
            self.config.gamma_attenuation,
        )
        .await?;

        // Stage 4: combine, threshold, fetch.
        let combined: Vec<(String, f64, f64)> = scored
            .into_iter()
            .map(|(id, base)| {
                let energy = spread.get(&id).copied().unwrap_or(0.0);
                (id, base + SPREAD_WEIGHT * energy, energy)
            })
            .collect();

        let total_energy: f64 = combined.iter().map(|(_, s, _)| s).sum();
        let bar = threshold(total_energy, max_energy);
        debug!(total_energy, bar, candidates = combined.len(), "energy threshold");

        let passing: Vec<(String, f64, f64)> = combined
            .into_iter()
            .filter(|(_, score, _)| *score > bar)
            .collect();
        if passing.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = passing.iter().map(|(id, _, _)| id.clone()).collect();
        let records =
            memory_ops::fetch_by_ids(self.meta.as_ref(), ctx, self.strict_tenant, &ids).await?;
        let mut by_id: HashMap<String, engram_core::models::MemoryRecord> =
            records.into_iter().map(|m| (m.id.clone(), m)).collect();

        let mut out: Vec<RetrievedMemory> = passing
            .into_iter()
            .filter_map(|(id, score, energy)| {
                by_id.remove(&id).map(|memory| RetrievedMemory {
                    memory,
                    score,
                    activation_energy: energy,
                })
            })
            .collect();
        out.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        info!(results = out.len(), "retrieval complete");
        Ok(out)
    }
}
