//! Bitemporal fact and fact-edge queries.
//!
//! Writes never mutate an existing row's validity except to close an
//! open window; superseding facts are new rows.

use engram_core::context::SecurityContext;
use engram_core::errors::{EngramError, EngramResult};
use engram_core::models::{TemporalEdge, TemporalFact};

use crate::params;
use crate::sql::{to_millis, SqlExecutor, SqlRow, SqlValue};
use crate::tenant;

pub async fn insert_fact(exec: &dyn SqlExecutor, fact: &TemporalFact) -> EngramResult<()> {
    let result = exec
        .run(
            "INSERT INTO temporal_facts
                (id, user_id, subject, predicate, object, valid_from, valid_to,
                 confidence, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &params![
                fact.id.as_str(),
                fact.user_id.as_deref(),
                fact.subject.as_str(),
                fact.predicate.as_str(),
                fact.object.as_str(),
                to_millis(fact.valid_from),
                fact.valid_to.map(to_millis),
                fact.confidence,
                fact.metadata.clone(),
                to_millis(fact.created_at),
            ],
        )
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            // The (user, s, p, o, valid_from) key is unique.
            let text = e.to_string();
            if text.to_lowercase().contains("unique") {
                Err(EngramError::conflict(format!(
                    "fact already asserted: {} {} {}",
                    fact.subject, fact.predicate, fact.object
                )))
            } else {
                Err(e)
            }
        }
    }
}

/// Close an open validity window. The only permitted mutation.
pub async fn close_fact(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    id: &str,
    valid_to_millis: i64,
) -> EngramResult<()> {
    let filter = tenant::write_filter(ctx, "user_id");
    let mut params = params![valid_to_millis, id];
    params.extend(filter.params);

    let rows = exec
        .run(
            &format!(
                "UPDATE temporal_facts SET valid_to = ?
                 WHERE id = ? AND valid_to IS NULL{}",
                filter.clause
            ),
            &params,
        )
        .await?;
    if rows == 0 {
        return Err(EngramError::not_found("fact", id));
    }
    Ok(())
}

/// Query facts by subject/predicate, optionally pinned to an instant.
pub async fn query_facts(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
    subject: Option<&str>,
    predicate: Option<&str>,
    at_millis: Option<i64>,
) -> EngramResult<Vec<TemporalFact>> {
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let mut sql = String::from(
        "SELECT id, user_id, subject, predicate, object, valid_from, valid_to,
                confidence, metadata, created_at
         FROM temporal_facts WHERE 1 = 1",
    );
    let mut params: Vec<SqlValue> = Vec::new();

    if let Some(s) = subject {
        sql.push_str(" AND subject = ?");
        params.push(SqlValue::from(s));
    }
    if let Some(p) = predicate {
        sql.push_str(" AND predicate = ?");
        params.push(SqlValue::from(p));
    }
    if let Some(at) = at_millis {
        sql.push_str(" AND valid_from <= ? AND (valid_to IS NULL OR valid_to > ?)");
        params.push(SqlValue::from(at));
        params.push(SqlValue::from(at));
    }
    sql.push_str(&filter.clause);
    params.extend(filter.params);
    sql.push_str(" ORDER BY valid_from DESC");

    let rows = exec.all(&sql, &params).await?;
    rows.iter().map(row_to_fact).collect()
}

pub async fn insert_edge(exec: &dyn SqlExecutor, edge: &TemporalEdge) -> EngramResult<()> {
    exec.run(
        "INSERT INTO temporal_edges
            (id, src_fact_id, dst_fact_id, relation, weight, valid_from, valid_to)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        &params![
            edge.id.as_str(),
            edge.src_fact_id.as_str(),
            edge.dst_fact_id.as_str(),
            edge.relation.as_str(),
            edge.weight,
            to_millis(edge.valid_from),
            edge.valid_to.map(to_millis),
        ],
    )
    .await?;
    Ok(())
}

pub async fn edges_for_fact(
    exec: &dyn SqlExecutor,
    fact_id: &str,
) -> EngramResult<Vec<TemporalEdge>> {
    let rows = exec
        .all(
            "SELECT id, src_fact_id, dst_fact_id, relation, weight, valid_from, valid_to
             FROM temporal_edges WHERE src_fact_id = ? OR dst_fact_id = ?",
            &params![fact_id, fact_id],
        )
        .await?;
    rows.iter().map(row_to_edge).collect()
}

fn row_to_fact(row: &SqlRow) -> EngramResult<TemporalFact> {
    Ok(TemporalFact {
        id: row.str("id")?,
        user_id: row.opt_str("user_id")?,
        subject: row.str("subject")?,
        predicate: row.str("predicate")?,
        object: row.str("object")?,
        valid_from: row.millis("valid_from")?,
        valid_to: row.opt_millis("valid_to")?,
        confidence: row.f64("confidence")?,
        metadata: row.json("metadata")?,
        created_at: row.millis("created_at")?,
    })
}

fn row_to_edge(row: &SqlRow) -> EngramResult<TemporalEdge> {
    Ok(TemporalEdge {
        id: row.str("id")?,
        src_fact_id: row.str("src_fact_id")?,
        dst_fact_id: row.str("dst_fact_id")?,
        relation: row.str("relation")?,
        weight: row.f64("weight")?,
        valid_from: row.millis("valid_from")?,
        valid_to: row.opt_millis("valid_to")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaStore;
    use chrono::Utc;

    #[tokio::test]
    async fn insert_query_close_lifecycle() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let ctx = SecurityContext::for_user("alice");
        let fact = TemporalFact::new(Some("alice".into()), "sky", "is", "blue", 0.9);
        insert_fact(&store, &fact).await.unwrap();

        let now = to_millis(Utc::now());
        let open = query_facts(&store, &ctx, false, Some("sky"), None, Some(now))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert!(open[0].valid_to.is_none());

        close_fact(&store, &ctx, &fact.id, now).await.unwrap();
        let after = query_facts(&store, &ctx, false, Some("sky"), None, Some(now + 1))
            .await
            .unwrap();
        assert!(after.is_empty());
    }

    #[tokio::test]
    async fn duplicate_fact_is_conflict() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let mut a = TemporalFact::new(Some("alice".into()), "sky", "is", "blue", 0.9);
        let mut b = TemporalFact::new(Some("alice".into()), "sky", "is", "blue", 0.8);
        // Same validity start to trip the unique key.
        b.valid_from = a.valid_from;
        a.metadata = serde_json::json!({});
        insert_fact(&store, &a).await.unwrap();
        let err = insert_fact(&store, &b).await.unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[tokio::test]
    async fn facts_are_tenant_scoped() {
        let store = MetaStore::open_in_memory().await.unwrap();
        insert_fact(
            &store,
            &TemporalFact::new(Some("alice".into()), "sky", "is", "blue", 0.9),
        )
        .await
        .unwrap();

        let bob = SecurityContext::for_user("bob");
        let hits = query_facts(&store, &bob, false, Some("sky"), None, None)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn edges_roundtrip() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let edge = TemporalEdge {
            id: "e1".into(),
            src_fact_id: "f1".into(),
            dst_fact_id: "f2".into(),
            relation: "supersedes".into(),
            weight: 0.7,
            valid_from: Utc::now(),
            valid_to: None,
        };
        insert_edge(&store, &edge).await.unwrap();
        let found = edges_for_fact(&store, "f2").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].relation, "supersedes");
    }
}
