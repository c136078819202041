//! Reflection synthesis and waypoint pruning.

use std::sync::Arc;

use engram_core::cancel::CancellationToken;
use engram_core::config::ReflectConfig;
use engram_core::errors::EngramResult;
use engram_core::models::{MemoryRecord, OpsLogEntry};
use engram_core::sector::Sector;
use engram_storage::meta::MetaStore;
use engram_storage::queries::{log_ops, memory_ops, waypoint_ops};
use engram_vector::simhash::simhash64;
use tracing::{debug, info};

use crate::cluster::{greedy_cluster, term_frequencies};

pub struct ReflectionEngine {
    meta: Arc<MetaStore>,
    config: ReflectConfig,
}

impl ReflectionEngine {
    pub fn new(meta: Arc<MetaStore>, config: ReflectConfig) -> Self {
        Self { meta, config }
    }

    /// One reflection pass. Returns the number of reflections created.
    ///
    /// Pulls the most recent window, drops already-consolidated and
    /// reflective rows, greedy-clusters the rest, and synthesizes one
    /// reflective summary per cluster of two or more. Sources are
    /// marked consolidated and get a salience bump (×1.1, capped at 1).
    pub async fn reflect(&self, cancel: &CancellationToken) -> EngramResult<usize> {
        let recent = memory_ops::recent_memories(self.meta.as_ref(), self.config.window).await?;
        if recent.len() < self.config.reflect_min {
            debug!(
                recent = recent.len(),
                needed = self.config.reflect_min,
                "not enough recent memories to reflect"
            );
            return Ok(0);
        }

        let entry = OpsLogEntry::started("reflect");
        log_ops::insert_ops_entry(self.meta.as_ref(), &entry).await?;

        let eligible: Vec<MemoryRecord> = recent
            .into_iter()
            .filter(|m| !m.consolidated && m.primary_sector != Sector::Reflective)
            .collect();

        let clusters = greedy_cluster(&eligible, self.config.cluster_similarity);
        let mut created = 0usize;

        for cluster in clusters {
            if cluster.len() < 2 {
                continue;
            }
            if cancel.is_cancelled() {
                debug!("reflection cancelled between clusters");
                break;
            }

            let members: Vec<&MemoryRecord> = cluster.iter().map(|&i| &eligible[i]).collect();
            let reflection = synthesize(&members);

            let tx = self.meta.begin().await?;
            memory_ops::insert_memory(&tx, &reflection).await?;
            for m in &members {
                let bumped = (m.salience * 1.1).min(1.0);
                memory_ops::set_consolidated(&tx, &m.id, bumped).await?;
            }
            tx.commit().await?;
            created += 1;
        }

        log_ops::finish_ops_entry(self.meta.as_ref(), &entry.id, created as i64, None).await?;
        info!(created, "reflection pass complete");
        Ok(created)
    }

    /// Remove waypoints below the prune threshold.
    pub async fn prune_waypoints(&self) -> EngramResult<u64> {
        let entry = OpsLogEntry::started("prune");
        log_ops::insert_ops_entry(self.meta.as_ref(), &entry).await?;

        let pruned = waypoint_ops::prune_below(self.meta.as_ref(), self.config.prune_threshold).await?;

        log_ops::finish_ops_entry(self.meta.as_ref(), &entry.id, pruned as i64, None).await?;
        if pruned > 0 {
            info!(pruned, "waypoints pruned");
        }
        Ok(pruned)
    }
}

/// Build the reflective summary row for a cluster.
///
/// Extractive and deterministic: sentences from the cluster are scored
/// by the frequency of their terms across the whole cluster, and the
/// top two become the summary. The reflection is tenanted only when
/// every source shares one user.
fn synthesize(members: &[&MemoryRecord]) -> MemoryRecord {
    let combined: String = members
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let cluster_tf = term_frequencies(&combined);

    let mut sentences: Vec<(&str, f64)> = members
        .iter()
        .flat_map(|m| split_sentences(&m.content))
        .map(|s| {
            let tf = term_frequencies(s);
            let score: f64 = tf
                .keys()
                .filter_map(|t| cluster_tf.get(t))
                .sum::<f64>()
                / (tf.len().max(1) as f64);
            (s, score)
        })
        .collect();
    sentences.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    sentences.dedup_by(|a, b| a.0 == b.0);

    let summary: String = sentences
        .iter()
        .take(2)
        .map(|(s, _)| s.trim())
        .collect::<Vec<_>>()
        .join(" ");

    // Tenant attribution: one owner or none.
    let first_user = members[0].user_id.clone();
    let user_id = if members.iter().all(|m| m.user_id == first_user) {
        first_user
    } else {
        None
    };

    let source_ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
    let mut reflection = MemoryRecord::new(summary.clone(), user_id);
    reflection.primary_sector = Sector::Reflective;
    reflection.tags = vec!["reflect:auto".to_string()];
    reflection.metadata = serde_json::json!({ "source_ids": source_ids });
    reflection.generated_summary = Some(summary);
    reflection.simhash = simhash64(&reflection.content);
    reflection
}

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Extract the recorded source ids from a reflection's metadata.
pub fn source_ids(reflection: &MemoryRecord) -> Vec<String> {
    reflection
        .metadata
        .get("source_ids")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
