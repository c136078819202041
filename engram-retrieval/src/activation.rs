//! Spreading activation over the waypoint graph.
//!
//! Edges live as rows; traversal keeps an explicit energy map with
//! max-aggregation, so cycles damp themselves instead of needing
//! detection. Each hop fetches the whole frontier's outgoing edges in
//! one query.

use std::collections::HashMap;

use engram_core::context::SecurityContext;
use engram_core::errors::EngramResult;
use engram_storage::queries::waypoint_ops;
use engram_storage::sql::SqlExecutor;
use tracing::debug;

/// Diffuse energy from `seeds` for up to `max_hops`.
///
/// Each seed starts at 1.0. An edge carries
/// `weight · act[src] · e^{-γ}` to its target; targets keep the maximum
/// energy ever offered. Self-loops are ignored.
pub async fn spreading_activation(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    seeds: &[String],
    max_hops: usize,
    gamma: f64,
) -> EngramResult<HashMap<String, f64>> {
    let mut act: HashMap<String, f64> = HashMap::new();
    for seed in seeds {
        act.insert(seed.clone(), 1.0);
    }

    let damping = (-gamma).exp();
    let mut frontier: Vec<String> = seeds.to_vec();

    for hop in 0..max_hops {
        if frontier.is_empty() {
            break;
        }
        let edges = waypoint_ops::outgoing_for(exec, ctx, &frontier).await?;
        let mut next: Vec<String> = Vec::new();

        for edge in &edges {
            if edge.src_id == edge.dst_id {
                continue;
            }
            let src_act = act.get(&edge.src_id).copied().unwrap_or(0.0);
            let energy = edge.weight * src_act * damping;
            let current = act.get(&edge.dst_id).copied().unwrap_or(0.0);
            if energy > current {
                act.insert(edge.dst_id.clone(), energy);
                next.push(edge.dst_id.clone());
            }
        }

        next.sort();
        next.dedup();
        debug!(hop, frontier = next.len(), "activation hop");
        frontier = next;
    }

    Ok(act)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engram_core::models::Waypoint;
    use engram_storage::meta::MetaStore;

    async fn graph(edges: &[(&str, &str, f64)]) -> MetaStore {
        let store = MetaStore::open_in_memory().await.unwrap();
        for (src, dst, w) in edges {
            waypoint_ops::upsert_waypoint(&store, &Waypoint::new(*src, *dst, None, *w))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn energy_spreads_and_damps() {
        let store = graph(&[("a", "b", 1.0), ("b", "c", 1.0)]).await;
        let ctx = SecurityContext::anonymous();
        let gamma = 0.35;
        let act = spreading_activation(&store, &ctx, &["a".into()], 3, gamma)
            .await
            .unwrap();

        let damp = (-gamma).exp();
        assert_eq!(act["a"], 1.0);
        assert!((act["b"] - damp).abs() < 1e-9);
        assert!((act["c"] - damp * damp).abs() < 1e-9);
    }

    #[tokio::test]
    async fn hop_limit_bounds_reach() {
        let store = graph(&[("a", "b", 1.0), ("b", "c", 1.0), ("c", "d", 1.0)]).await;
        let ctx = SecurityContext::anonymous();
        let act = spreading_activation(&store, &ctx, &["a".into()], 2, 0.35)
            .await
            .unwrap();
        assert!(act.contains_key("c"));
        assert!(!act.contains_key("d"));
    }

    #[tokio::test]
    async fn cycles_converge_by_max_aggregation() {
        let store = graph(&[("a", "b", 0.9), ("b", "a", 0.9)]).await;
        let ctx = SecurityContext::anonymous();
        let act = spreading_activation(&store, &ctx, &["a".into()], 5, 0.35)
            .await
            .unwrap();
        // The seed keeps its initial energy; the cycle cannot inflate it.
        assert_eq!(act["a"], 1.0);
        assert!(act["b"] < 1.0);
    }

    #[tokio::test]
    async fn self_loops_are_ignored() {
        let store = graph(&[("a", "a", 1.0), ("a", "b", 0.5)]).await;
        let ctx = SecurityContext::anonymous();
        let act = spreading_activation(&store, &ctx, &["a".into()], 3, 0.35)
            .await
            .unwrap();
        assert_eq!(act["a"], 1.0);
        assert!(act.contains_key("b"));
    }

    #[tokio::test]
    async fn damping_bound_holds() {
        // P-style check: no node exceeds e^{-γ·hops} from the best seed.
        let store = graph(&[
            ("a", "b", 1.0),
            ("a", "c", 0.8),
            ("b", "c", 1.0),
            ("c", "d", 0.9),
        ])
        .await;
        let ctx = SecurityContext::anonymous();
        let gamma = 0.35;
        let act = spreading_activation(&store, &ctx, &["a".into()], 3, gamma)
            .await
            .unwrap();
        let damp = (-gamma).exp();
        for (node, energy) in &act {
            if node == "a" {
                continue;
            }
            assert!(*energy <= damp + 1e-9, "{node} has {energy}");
        }
    }
}
