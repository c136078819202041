//! Retrieval and waypoint behaviour through the assembled engine.

use test_fixtures::{alice, test_engine};

// ── Waypoint creation at ingestion ───────────────────────────────────

#[tokio::test]
async fn similar_memories_are_linked_with_bounded_weight() {
    let engine = test_engine().await;
    let ctx = alice();
    let first = engine
        .add_memory(
            &ctx,
            "morning run through the park felt great",
            vec![],
            serde_json::json!({}),
        )
        .await
        .unwrap();
    let second = engine
        .add_memory(
            &ctx,
            "morning run through the park felt amazing",
            vec![],
            serde_json::json!({}),
        )
        .await
        .unwrap();
    assert!(!second.deduplicated);

    let edges = engine.neighbours(&ctx, &second.id).await.unwrap();
    assert!(!edges.is_empty(), "expected a waypoint to the similar memory");
    let edge = edges.iter().find(|w| w.dst_id == first.id).unwrap();
    assert!(edge.weight > 0.0 && edge.weight <= 1.0);
}

// ── Ranking and thresholding ─────────────────────────────────────────

#[tokio::test]
async fn close_match_ranks_first_and_noise_is_excluded() {
    let engine = test_engine().await;
    let ctx = alice();

    engine
        .add_memory(
            &ctx,
            "rust borrow checker lifetimes ownership",
            vec![],
            serde_json::json!({}),
        )
        .await
        .unwrap();
    engine
        .add_memory(
            &ctx,
            "rust compiler error messages",
            vec![],
            serde_json::json!({}),
        )
        .await
        .unwrap();
    engine
        .add_memory(
            &ctx,
            "banana bread recipe with walnuts",
            vec![],
            serde_json::json!({}),
        )
        .await
        .unwrap();

    let hits = engine
        .retrieve(
            &ctx,
            "rust borrow checker ownership",
            engram::Sector::Semantic,
            0.3,
        )
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert!(hits[0].memory.content.contains("borrow checker"));
    assert!(hits
        .iter()
        .all(|r| !r.memory.content.contains("banana bread")));
    // Scores come back ordered.
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn reinforced_memories_rank_higher() {
    let engine = test_engine().await;
    let ctx = alice();

    let a = engine
        .add_memory(&ctx, "project kickoff meeting notes", vec![], serde_json::json!({}))
        .await
        .unwrap();
    engine
        .add_memory(&ctx, "quarterly budget spreadsheet totals", vec![], serde_json::json!({}))
        .await
        .unwrap();

    engine.reinforce(&ctx, &a.id).await.unwrap();

    let hits = engine
        .retrieve(&ctx, "project kickoff meeting notes", engram::Sector::Semantic, 0.1)
        .await
        .unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].memory.id, a.id);
}

// ── Sector routing ───────────────────────────────────────────────────

#[tokio::test]
async fn requested_sectors_are_respected() {
    let engine = test_engine().await;
    let ctx = alice();
    let out = engine
        .add_memory(
            &ctx,
            "step one compile step two deploy",
            vec![],
            serde_json::json!({"sectors": ["procedural"]}),
        )
        .await
        .unwrap();
    assert_eq!(out.primary_sector, engram::Sector::Procedural);
}
