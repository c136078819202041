//! Decay, reinforcement, reflection, and pruning through the engine.

use engram::CancellationToken;
use test_fixtures::{admin, alice, test_engine};

// ── Reinforcement raises, decay lowers ───────────────────────────────

#[tokio::test]
async fn reinforcement_is_monotone_toward_one() {
    let engine = test_engine().await;
    let ctx = alice();
    let out = engine
        .add_memory(&ctx, "remember this", vec![], serde_json::json!({}))
        .await
        .unwrap();

    let mut prev = engine.get_memory(&ctx, &out.id).await.unwrap().unwrap().salience;
    for _ in 0..5 {
        let next = engine.reinforce(&ctx, &out.id).await.unwrap();
        assert!(next > prev);
        assert!(next <= 1.0);
        prev = next;
    }
}

#[tokio::test]
async fn decay_sweep_only_touches_stale_memories() {
    let engine = test_engine().await;
    let ctx = alice();
    engine
        .add_memory(&ctx, "fresh memory", vec![], serde_json::json!({}))
        .await
        .unwrap();

    // Everything is fresh, so the sweep writes nothing.
    let written = engine.run_decay(&CancellationToken::new()).await.unwrap();
    assert_eq!(written, 0);
}

// ── Reflection ───────────────────────────────────────────────────────

#[tokio::test]
async fn reflection_synthesizes_and_consolidates() {
    let engine = test_engine().await;
    let ctx = alice();

    // Enough near-identical memories to clear the minimum and cluster.
    for i in 0..20 {
        engine
            .add_memory(
                &ctx,
                &format!("weekly review went well sprint {i} shipped on time"),
                vec![],
                serde_json::json!({}),
            )
            .await
            .unwrap();
    }

    let created = engine
        .run_reflection(&CancellationToken::new())
        .await
        .unwrap();
    assert!(created >= 1);

    let all = engine.list_memories(&ctx, 100, 0).await.unwrap();
    let reflections: Vec<_> = all
        .iter()
        .filter(|m| m.primary_sector == engram::Sector::Reflective)
        .collect();
    assert!(!reflections.is_empty());
    let reflection = reflections[0];
    assert!(reflection.tags.contains(&"reflect:auto".to_string()));
    assert!(reflection.metadata.get("source_ids").is_some());

    // Sources are consolidated with bumped salience.
    let consolidated: Vec<_> = all.iter().filter(|m| m.consolidated).collect();
    assert!(consolidated.len() >= 2);
    for m in &consolidated {
        assert!(m.salience > 0.5);
    }

    // A reflection is never re-reflected.
    let again = engine
        .run_reflection(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(again, 0);
}

// ── Pruning ──────────────────────────────────────────────────────────

#[tokio::test]
async fn pruning_reports_through_ops_log() {
    let engine = test_engine().await;
    let pruned = engine.prune_waypoints().await.unwrap();
    assert_eq!(pruned, 0);

    // Both maintenance entry points leave an ops trail the admin can
    // audit; the sweep above wrote one row.
    let stalled = engine.stalled_embed_logs(&admin()).await.unwrap();
    assert!(stalled.is_empty());
}

// ── Scheduler lifecycle ──────────────────────────────────────────────

#[tokio::test]
async fn maintenance_starts_and_shuts_down() {
    let engine = test_engine().await;
    engine.start_maintenance();
    // Idempotent.
    engine.start_maintenance();
    engine.shutdown().await.unwrap();
}
