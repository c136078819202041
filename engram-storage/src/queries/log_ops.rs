//! Embed-log and maintenance ops-log queries.

use chrono::Utc;
use engram_core::errors::EngramResult;
use engram_core::models::{EmbedLog, EmbedLogStatus, OpsLogEntry};

use crate::params;
use crate::sql::{to_millis, SqlExecutor, SqlRow};

pub async fn insert_embed_log(exec: &dyn SqlExecutor, log: &EmbedLog) -> EngramResult<()> {
    exec.run(
        "INSERT INTO embed_logs (id, memory_id, status, model, created_at, updated_at, error)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        &params![
            log.id.as_str(),
            log.memory_id.as_deref(),
            log.status.as_str(),
            log.model.as_str(),
            to_millis(log.created_at),
            to_millis(log.updated_at),
            log.error.as_deref(),
        ],
    )
    .await?;
    Ok(())
}

/// Move a pending row to a terminal state. Terminal states are
/// absorbing: the guard in the WHERE clause makes a second transition a
/// no-op rather than an overwrite.
pub async fn mark_embed_log(
    exec: &dyn SqlExecutor,
    id: &str,
    status: EmbedLogStatus,
    error: Option<&str>,
) -> EngramResult<bool> {
    let rows = exec
        .run(
            "UPDATE embed_logs SET status = ?, error = ?, updated_at = ?
             WHERE id = ? AND status = 'pending'",
            &params![status.as_str(), error, to_millis(Utc::now()), id],
        )
        .await?;
    Ok(rows > 0)
}

pub async fn get_embed_log(exec: &dyn SqlExecutor, id: &str) -> EngramResult<Option<EmbedLog>> {
    let row = exec
        .get(
            "SELECT id, memory_id, status, model, created_at, updated_at, error
             FROM embed_logs WHERE id = ?",
            &params![id],
        )
        .await?;
    row.map(|r| row_to_embed_log(&r)).transpose()
}

/// Pending rows older than the stall cutoff. Surfaced for operators;
/// the core does not auto-recover them.
pub async fn stalled_embed_logs(
    exec: &dyn SqlExecutor,
    cutoff_millis: i64,
) -> EngramResult<Vec<EmbedLog>> {
    let rows = exec
        .all(
            "SELECT id, memory_id, status, model, created_at, updated_at, error
             FROM embed_logs WHERE status = 'pending' AND created_at < ?",
            &params![cutoff_millis],
        )
        .await?;
    rows.iter().map(row_to_embed_log).collect()
}

pub async fn insert_ops_entry(exec: &dyn SqlExecutor, entry: &OpsLogEntry) -> EngramResult<()> {
    exec.run(
        "INSERT INTO ops_log (id, op, started_at, finished_at, affected, detail)
         VALUES (?, ?, ?, ?, ?, ?)",
        &params![
            entry.id.as_str(),
            entry.op.as_str(),
            to_millis(entry.started_at),
            entry.finished_at.map(to_millis),
            entry.affected,
            entry.detail.as_deref(),
        ],
    )
    .await?;
    Ok(())
}

pub async fn finish_ops_entry(
    exec: &dyn SqlExecutor,
    id: &str,
    affected: i64,
    detail: Option<&str>,
) -> EngramResult<()> {
    exec.run(
        "UPDATE ops_log SET finished_at = ?, affected = ?, detail = ? WHERE id = ?",
        &params![to_millis(Utc::now()), affected, detail, id],
    )
    .await?;
    Ok(())
}

fn row_to_embed_log(row: &SqlRow) -> EngramResult<EmbedLog> {
    let status_str = row.str("status")?;
    let status = EmbedLogStatus::parse(&status_str).ok_or_else(|| {
        engram_core::errors::EngramError::internal(format!("bad embed log status: {status_str}"))
    })?;
    Ok(EmbedLog {
        id: row.str("id")?,
        memory_id: row.opt_str("memory_id")?,
        status,
        model: row.str("model")?,
        created_at: row.millis("created_at")?,
        updated_at: row.millis("updated_at")?,
        error: row.opt_str("error")?,
    })
}
