//! Waypoint graph queries.
//!
//! Edges are plain rows keyed (src, dst, user); the anonymous tenant is
//! stored as ''. Upserts are idempotent (last writer wins on weight), so
//! reinforcement races converge.

use engram_core::context::SecurityContext;
use engram_core::errors::EngramResult;
use engram_core::models::Waypoint;

use crate::params;
use crate::sql::{to_millis, SqlExecutor, SqlRow, SqlValue};

use super::in_placeholders;

/// The key encoding for anonymous edges.
fn user_key(user_id: Option<&str>) -> String {
    user_id.unwrap_or("").to_string()
}

fn key_to_user(key: String) -> Option<String> {
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

/// Upsert an edge. Self-loops are refused by the caller; weight is
/// replaced, coactivations preserved.
pub async fn upsert_waypoint(exec: &dyn SqlExecutor, wp: &Waypoint) -> EngramResult<()> {
    exec.run(
        "INSERT INTO waypoints (src_id, dst_id, user_id, weight, coactivations, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (src_id, dst_id, user_id) DO UPDATE SET
            weight = excluded.weight,
            updated_at = excluded.updated_at",
        &params![
            wp.src_id.as_str(),
            wp.dst_id.as_str(),
            user_key(wp.user_id.as_deref()),
            wp.weight,
            wp.coactivations,
            to_millis(wp.created_at),
            to_millis(wp.updated_at),
        ],
    )
    .await?;
    Ok(())
}

/// Reinforce one edge: replace the weight and count the co-activation.
pub async fn reinforce_waypoint(
    exec: &dyn SqlExecutor,
    src_id: &str,
    dst_id: &str,
    user_id: Option<&str>,
    weight: f64,
    now_millis: i64,
) -> EngramResult<()> {
    exec.run(
        "UPDATE waypoints SET weight = ?, coactivations = coactivations + 1, updated_at = ?
         WHERE src_id = ? AND dst_id = ? AND user_id = ?",
        &params![weight, now_millis, src_id, dst_id, user_key(user_id)],
    )
    .await?;
    Ok(())
}

/// Outgoing edges of one memory, scoped to the caller's tenant.
pub async fn neighbours(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    src_id: &str,
) -> EngramResult<Vec<Waypoint>> {
    let rows = if ctx.admin {
        exec.all(
            "SELECT src_id, dst_id, user_id, weight, coactivations, created_at, updated_at
             FROM waypoints WHERE src_id = ? ORDER BY weight DESC",
            &params![src_id],
        )
        .await?
    } else {
        exec.all(
            "SELECT src_id, dst_id, user_id, weight, coactivations, created_at, updated_at
             FROM waypoints WHERE src_id = ? AND user_id = ? ORDER BY weight DESC",
            &params![src_id, user_key(ctx.user_id.as_deref())],
        )
        .await?
    };
    rows.iter().map(row_to_waypoint).collect()
}

/// Outgoing edges for a whole frontier in one query (spreading
/// activation fetches per hop, not per node).
pub async fn outgoing_for(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    src_ids: &[String],
) -> EngramResult<Vec<Waypoint>> {
    if src_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut params: Vec<SqlValue> = src_ids.iter().map(|s| SqlValue::from(s.as_str())).collect();
    let mut sql = format!(
        "SELECT src_id, dst_id, user_id, weight, coactivations, created_at, updated_at
         FROM waypoints WHERE src_id IN ({})",
        in_placeholders(src_ids.len())
    );
    if !ctx.admin {
        sql.push_str(" AND user_id = ?");
        params.push(SqlValue::from(user_key(ctx.user_id.as_deref())));
    }

    let rows = exec.all(&sql, &params).await?;
    rows.iter().map(row_to_waypoint).collect()
}

/// Remove every edge touching a memory (delete cascade).
pub async fn delete_for_memory(exec: &dyn SqlExecutor, id: &str) -> EngramResult<u64> {
    exec.run(
        "DELETE FROM waypoints WHERE src_id = ? OR dst_id = ?",
        &params![id, id],
    )
    .await
}

/// Maintenance: drop edges below the prune threshold.
pub async fn prune_below(exec: &dyn SqlExecutor, threshold: f64) -> EngramResult<u64> {
    exec.run("DELETE FROM waypoints WHERE weight < ?", &params![threshold])
        .await
}

fn row_to_waypoint(row: &SqlRow) -> EngramResult<Waypoint> {
    Ok(Waypoint {
        src_id: row.str("src_id")?,
        dst_id: row.str("dst_id")?,
        user_id: key_to_user(row.str("user_id")?),
        weight: row.f64("weight")?,
        coactivations: row.i64("coactivations")?,
        created_at: row.millis("created_at")?,
        updated_at: row.millis("updated_at")?,
    })
}
