//! Waypoint discovery for freshly ingested memories.
//!
//! Finds the new memory's closest existing neighbours in the semantic
//! sector, blends in emotional similarity where both sides have an
//! emotional vector, and proposes at most k edges above the link
//! threshold.

use std::collections::HashMap;

use engram_core::config::DynamicsConfig;
use engram_core::context::SecurityContext;
use engram_core::errors::EngramResult;
use engram_core::models::Waypoint;
use engram_core::sector::Sector;
use engram_core::traits::VectorStore;
use engram_dynamics::salience::link_weight;
use engram_vector::ops::cosine;
use tracing::debug;

/// Propose waypoints from `memory_id` to its nearest neighbours.
pub async fn discover_links(
    vectors: &dyn VectorStore,
    ctx: &SecurityContext,
    config: &DynamicsConfig,
    memory_id: &str,
    user_id: Option<&str>,
    semantic_vec: Option<&[f32]>,
    emotional_vec: Option<&[f32]>,
) -> EngramResult<Vec<Waypoint>> {
    let Some(sem) = semantic_vec else {
        return Ok(Vec::new());
    };

    // Over-fetch so dropping self and sub-threshold hits still leaves k.
    let fetch = config.max_links_per_add * 2 + 1;
    let hits = vectors
        .search_similar(ctx, Sector::Semantic, sem, fetch)
        .await?;

    let neighbour_ids: Vec<String> = hits
        .iter()
        .filter(|h| h.memory_id != memory_id)
        .filter(|h| (h.similarity as f64) >= config.link_threshold)
        .map(|h| h.memory_id.clone())
        .collect();
    if neighbour_ids.is_empty() {
        return Ok(Vec::new());
    }

    // Emotional similarity refines the weight where both sides have one.
    let emo_vectors: HashMap<String, Vec<f32>> = vectors
        .by_ids(ctx, Sector::Emotional, &neighbour_ids)
        .await?
        .into_iter()
        .map(|v| (v.memory_id.clone(), v.v))
        .collect();

    let mut links = Vec::new();
    for hit in hits {
        if hit.memory_id == memory_id || (hit.similarity as f64) < config.link_threshold {
            continue;
        }
        let emo_sim = match (emotional_vec, emo_vectors.get(&hit.memory_id)) {
            (Some(mine), Some(theirs)) if mine.len() == theirs.len() => {
                cosine(mine, theirs)? as f64
            }
            _ => 0.0,
        };
        let weight = link_weight(hit.similarity as f64, emo_sim);
        links.push(Waypoint::new(
            memory_id,
            hit.memory_id.clone(),
            user_id.map(String::from),
            weight,
        ));
        if links.len() == config.max_links_per_add {
            break;
        }
    }

    debug!(memory_id, links = links.len(), "waypoint discovery");
    Ok(links)
}
