//! Insert, read, update, delete, and scan queries for memories.

use engram_core::context::SecurityContext;
use engram_core::errors::{EngramError, EngramResult};
use engram_core::models::MemoryRecord;
use engram_core::sector::Sector;
use engram_vector::codec::{bytes_to_vec, vec_to_bytes};
use engram_vector::simhash::{simhash_from_hex, simhash_to_hex};

use crate::params;
use crate::sql::{to_millis, SqlExecutor, SqlRow, SqlValue};
use crate::tenant;

use super::in_placeholders;

const MEMORY_COLUMNS: &str = "id, user_id, content, primary_sector, sectors, tags, metadata,
    salience, decay_lambda, version, created_at, updated_at, last_seen_at,
    segment, simhash, mean_vec, mean_dim, feedback_score, consolidated, generated_summary";

/// A retrieval candidate: just enough to score without fetching content.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub primary_sector: Sector,
    pub salience: f64,
    pub mean_vec: Option<Vec<f32>>,
}

/// One row of the decay sweep.
#[derive(Debug, Clone)]
pub struct DecayRow {
    pub id: String,
    pub salience: f64,
    pub last_seen_at: chrono::DateTime<chrono::Utc>,
}

pub async fn insert_memory(exec: &dyn SqlExecutor, memory: &MemoryRecord) -> EngramResult<()> {
    let sectors = serde_json::to_value(&memory.sectors)
        .map_err(|e| EngramError::internal(e.to_string()))?;
    let tags =
        serde_json::to_value(&memory.tags).map_err(|e| EngramError::internal(e.to_string()))?;

    exec.run(
        &format!(
            "INSERT INTO memories ({MEMORY_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ),
        &params![
            memory.id.as_str(),
            memory.user_id.as_deref(),
            memory.content.as_str(),
            memory.primary_sector.as_str(),
            sectors.to_string(),
            tags.to_string(),
            memory.metadata.clone(),
            memory.salience,
            memory.decay_lambda,
            memory.version,
            to_millis(memory.created_at),
            to_millis(memory.updated_at),
            to_millis(memory.last_seen_at),
            memory.segment,
            simhash_to_hex(memory.simhash),
            memory.mean_vec.as_ref().map(|v| vec_to_bytes(v)),
            memory.mean_dim.map(|d| d as i64),
            memory.feedback_score,
            memory.consolidated,
            memory.generated_summary.as_deref(),
        ],
    )
    .await?;
    Ok(())
}

/// Fetch one memory visible to the caller. Invisible rows read as absent.
pub async fn get_memory(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
    id: &str,
) -> EngramResult<Option<MemoryRecord>> {
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let mut params = params![id];
    params.extend(filter.params);

    let row = exec
        .get(
            &format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?{}", filter.clause),
            &params,
        )
        .await?;
    row.map(|r| row_to_memory(&r)).transpose()
}

/// The soft-dedup probe: the caller's own row with this fingerprint.
pub async fn find_by_simhash(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    simhash: u64,
) -> EngramResult<Option<MemoryRecord>> {
    let filter = tenant::write_filter(ctx, "user_id");
    let mut params = params![simhash_to_hex(simhash)];
    params.extend(filter.params);

    let row = exec
        .get(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories WHERE simhash = ?{}",
                filter.clause
            ),
            &params,
        )
        .await?;
    row.map(|r| row_to_memory(&r)).transpose()
}

pub async fn list_memories(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
    limit: usize,
    offset: usize,
) -> EngramResult<Vec<MemoryRecord>> {
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let mut params: Vec<SqlValue> = filter.params;
    params.push(SqlValue::from(limit));
    params.push(SqlValue::from(offset));

    let rows = exec
        .all(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories WHERE 1 = 1{}
                 ORDER BY created_at DESC LIMIT ? OFFSET ?",
                filter.clause
            ),
            &params,
        )
        .await?;
    rows.iter().map(row_to_memory).collect()
}

pub async fn count_memories(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
) -> EngramResult<u64> {
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let row = exec
        .get(
            &format!("SELECT COUNT(*) AS n FROM memories WHERE 1 = 1{}", filter.clause),
            &filter.params,
        )
        .await?;
    Ok(row.map(|r| r.i64("n").unwrap_or(0)).unwrap_or(0) as u64)
}

/// Simple keyword search: LIKE over content, tenant-scoped.
pub async fn search_keyword(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
    needle: &str,
    limit: usize,
) -> EngramResult<Vec<MemoryRecord>> {
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let mut params = params![format!("%{needle}%")];
    params.extend(filter.params);
    params.push(SqlValue::from(limit));

    let rows = exec
        .all(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories WHERE content LIKE ?{}
                 ORDER BY last_seen_at DESC LIMIT ?",
                filter.clause
            ),
            &params,
        )
        .await?;
    rows.iter().map(row_to_memory).collect()
}

/// Full-column update by id. The caller has already authorised via a
/// scoped read; a zero row count still maps to NotFound in case the row
/// vanished in between.
pub async fn update_memory(exec: &dyn SqlExecutor, memory: &MemoryRecord) -> EngramResult<()> {
    let sectors = serde_json::to_value(&memory.sectors)
        .map_err(|e| EngramError::internal(e.to_string()))?;
    let tags =
        serde_json::to_value(&memory.tags).map_err(|e| EngramError::internal(e.to_string()))?;

    let rows = exec
        .run(
            "UPDATE memories SET
                content = ?, primary_sector = ?, sectors = ?, tags = ?, metadata = ?,
                salience = ?, decay_lambda = ?, version = ?, updated_at = ?,
                last_seen_at = ?, simhash = ?, mean_vec = ?, mean_dim = ?,
                feedback_score = ?, consolidated = ?, generated_summary = ?
             WHERE id = ?",
            &params![
                memory.content.as_str(),
                memory.primary_sector.as_str(),
                sectors.to_string(),
                tags.to_string(),
                memory.metadata.clone(),
                memory.salience,
                memory.decay_lambda,
                memory.version,
                to_millis(memory.updated_at),
                to_millis(memory.last_seen_at),
                simhash_to_hex(memory.simhash),
                memory.mean_vec.as_ref().map(|v| vec_to_bytes(v)),
                memory.mean_dim.map(|d| d as i64),
                memory.feedback_score,
                memory.consolidated,
                memory.generated_summary.as_deref(),
                memory.id.as_str(),
            ],
        )
        .await?;
    if rows == 0 {
        return Err(EngramError::not_found("memory", memory.id.clone()));
    }
    Ok(())
}

/// Salience write-back, optionally touching `last_seen_at`.
pub async fn update_salience(
    exec: &dyn SqlExecutor,
    id: &str,
    salience: f64,
    last_seen_millis: Option<i64>,
) -> EngramResult<()> {
    match last_seen_millis {
        Some(ms) => {
            exec.run(
                "UPDATE memories SET salience = ?, last_seen_at = ? WHERE id = ?",
                &params![salience, ms, id],
            )
            .await?;
        }
        None => {
            exec.run(
                "UPDATE memories SET salience = ? WHERE id = ?",
                &params![salience, id],
            )
            .await?;
        }
    }
    Ok(())
}

/// Reflection bookkeeping: mark a source consolidated and set its bumped
/// salience in one statement.
pub async fn set_consolidated(
    exec: &dyn SqlExecutor,
    id: &str,
    salience: f64,
) -> EngramResult<()> {
    exec.run(
        "UPDATE memories SET consolidated = 1, salience = ? WHERE id = ?",
        &params![salience, id],
    )
    .await?;
    Ok(())
}

pub async fn update_feedback(exec: &dyn SqlExecutor, id: &str, score: f64) -> EngramResult<()> {
    exec.run(
        "UPDATE memories SET feedback_score = ? WHERE id = ?",
        &params![score, id],
    )
    .await?;
    Ok(())
}

pub async fn delete_memory(exec: &dyn SqlExecutor, id: &str) -> EngramResult<u64> {
    exec.run("DELETE FROM memories WHERE id = ?", &params![id]).await
}

/// Retrieval candidate gather: everything alive enough to matter.
pub async fn candidates(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
) -> EngramResult<Vec<Candidate>> {
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let rows = exec
        .all(
            &format!(
                "SELECT id, primary_sector, salience, mean_vec FROM memories
                 WHERE salience > 0.01{}",
                filter.clause
            ),
            &filter.params,
        )
        .await?;

    rows.iter()
        .map(|r| {
            Ok(Candidate {
                id: r.str("id")?,
                primary_sector: Sector::parse_or_semantic(&r.str("primary_sector")?),
                salience: r.f64("salience")?,
                mean_vec: r.opt_blob("mean_vec")?.map(|b| bytes_to_vec(&b)).transpose()?,
            })
        })
        .collect()
}

/// One page of the decay sweep, ordered by id for stable paging.
pub async fn decay_page(
    exec: &dyn SqlExecutor,
    offset: usize,
    limit: usize,
) -> EngramResult<Vec<DecayRow>> {
    let rows = exec
        .all(
            "SELECT id, salience, last_seen_at FROM memories ORDER BY id LIMIT ? OFFSET ?",
            &params![limit, offset],
        )
        .await?;
    rows.iter()
        .map(|r| {
            Ok(DecayRow {
                id: r.str("id")?,
                salience: r.f64("salience")?,
                last_seen_at: r.millis("last_seen_at")?,
            })
        })
        .collect()
}

/// Most recent memories across tenants, for reflection.
pub async fn recent_memories(
    exec: &dyn SqlExecutor,
    limit: usize,
) -> EngramResult<Vec<MemoryRecord>> {
    let rows = exec
        .all(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories ORDER BY created_at DESC LIMIT ?"
            ),
            &params![limit],
        )
        .await?;
    rows.iter().map(row_to_memory).collect()
}

/// Batch content fetch for retrieval results.
pub async fn fetch_by_ids(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
    ids: &[String],
) -> EngramResult<Vec<MemoryRecord>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let mut params: Vec<SqlValue> = ids.iter().map(|id| SqlValue::from(id.as_str())).collect();
    params.extend(filter.params);

    let rows = exec
        .all(
            &format!(
                "SELECT {MEMORY_COLUMNS} FROM memories WHERE id IN ({}){}",
                in_placeholders(ids.len()),
                filter.clause
            ),
            &params,
        )
        .await?;
    rows.iter().map(row_to_memory).collect()
}

/// Parse a row from the memories table.
pub fn row_to_memory(row: &SqlRow) -> EngramResult<MemoryRecord> {
    let sectors_json = row.str("sectors")?;
    let sectors: Vec<Sector> = serde_json::from_str(&sectors_json)
        .map_err(|e| EngramError::internal(format!("parse sectors: {e}")))?;
    let tags_json = row.str("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json)
        .map_err(|e| EngramError::internal(format!("parse tags: {e}")))?;

    let simhash_hex = row.str("simhash")?;
    let simhash = simhash_from_hex(&simhash_hex)
        .ok_or_else(|| EngramError::internal(format!("bad simhash: {simhash_hex}")))?;

    let mean_vec = row.opt_blob("mean_vec")?.map(|b| bytes_to_vec(&b)).transpose()?;
    let mean_dim = row.opt_i64("mean_dim")?.map(|d| d as usize);
    // Stored dim must agree with the stored vector.
    if let (Some(v), Some(d)) = (&mean_vec, mean_dim) {
        if v.len() != d {
            return Err(EngramError::internal(format!(
                "mean_vec length {} does not match mean_dim {d}",
                v.len()
            )));
        }
    }

    Ok(MemoryRecord {
        id: row.str("id")?,
        user_id: row.opt_str("user_id")?,
        content: row.str("content")?,
        primary_sector: Sector::parse_or_semantic(&row.str("primary_sector")?),
        sectors,
        tags,
        metadata: row.json("metadata")?,
        salience: row.f64("salience")?,
        decay_lambda: row.f64("decay_lambda")?,
        version: row.i64("version")?,
        created_at: row.millis("created_at")?,
        updated_at: row.millis("updated_at")?,
        last_seen_at: row.millis("last_seen_at")?,
        segment: row.i64("segment")?,
        simhash,
        mean_vec,
        mean_dim,
        feedback_score: row.f64("feedback_score")?,
        consolidated: row.bool("consolidated")?,
        generated_summary: row.opt_str("generated_summary")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaStore;

    fn record(user: Option<&str>, content: &str) -> MemoryRecord {
        let mut m = MemoryRecord::new(content, user.map(String::from));
        m.simhash = engram_vector::simhash64(content);
        m
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let mut m = record(Some("alice"), "the quick brown fox");
        m.tags = vec!["animal".into()];
        m.metadata = serde_json::json!({"source": "test"});
        m.mean_vec = Some(vec![0.5, 0.5]);
        m.mean_dim = Some(2);
        insert_memory(&store, &m).await.unwrap();

        let ctx = SecurityContext::for_user("alice");
        let got = get_memory(&store, &ctx, false, &m.id).await.unwrap().unwrap();
        assert_eq!(got.content, "the quick brown fox");
        assert_eq!(got.tags, vec!["animal".to_string()]);
        assert_eq!(got.metadata["source"], "test");
        assert_eq!(got.mean_vec.as_deref(), Some(&[0.5, 0.5][..]));
        assert_eq!(got.simhash, m.simhash);
    }

    #[tokio::test]
    async fn cross_tenant_get_reads_as_absent() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let m = record(Some("alice"), "private note");
        insert_memory(&store, &m).await.unwrap();

        let bob = SecurityContext::for_user("bob");
        assert!(get_memory(&store, &bob, false, &m.id).await.unwrap().is_none());

        let admin = SecurityContext::admin();
        assert!(get_memory(&store, &admin, false, &m.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn simhash_lookup_is_per_tenant() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let m = record(Some("alice"), "apples are red");
        insert_memory(&store, &m).await.unwrap();

        let alice = SecurityContext::for_user("alice");
        let hit = find_by_simhash(&store, &alice, m.simhash).await.unwrap();
        assert_eq!(hit.unwrap().id, m.id);

        let bob = SecurityContext::for_user("bob");
        assert!(find_by_simhash(&store, &bob, m.simhash).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keyword_search_is_scoped() {
        let store = MetaStore::open_in_memory().await.unwrap();
        insert_memory(&store, &record(Some("alice"), "rust borrow checker"))
            .await
            .unwrap();
        insert_memory(&store, &record(Some("bob"), "rust lifetimes"))
            .await
            .unwrap();

        let alice = SecurityContext::for_user("alice");
        let hits = search_keyword(&store, &alice, false, "rust", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].user_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn update_missing_row_is_not_found() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let m = record(Some("alice"), "ghost");
        let err = update_memory(&store, &m).await.unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[tokio::test]
    async fn candidates_exclude_dormant() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let mut alive = record(Some("alice"), "alive");
        alive.mean_vec = Some(vec![1.0, 0.0]);
        alive.mean_dim = Some(2);
        insert_memory(&store, &alive).await.unwrap();

        let mut dormant = record(Some("alice"), "dormant");
        dormant.salience = 0.001;
        insert_memory(&store, &dormant).await.unwrap();

        let ctx = SecurityContext::for_user("alice");
        let c = candidates(&store, &ctx, false).await.unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c[0].id, alive.id);
    }
}
