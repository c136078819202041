//! Aggregate views: per-sector counts and mean salience.

use engram_core::context::SecurityContext;
use engram_core::errors::EngramResult;
use engram_core::models::SectorStats;
use engram_core::sector::Sector;

use crate::sql::SqlExecutor;
use crate::tenant;

pub async fn sector_stats(
    exec: &dyn SqlExecutor,
    ctx: &SecurityContext,
    strict_tenant: bool,
) -> EngramResult<Vec<SectorStats>> {
    let filter = tenant::read_filter(ctx, strict_tenant, "user_id")?;
    let rows = exec
        .all(
            &format!(
                "SELECT primary_sector, COUNT(*) AS n, AVG(salience) AS mean_salience
                 FROM memories WHERE 1 = 1{}
                 GROUP BY primary_sector",
                filter.clause
            ),
            &filter.params,
        )
        .await?;

    rows.iter()
        .map(|r| {
            Ok(SectorStats {
                sector: Sector::parse_or_semantic(&r.str("primary_sector")?),
                count: r.i64("n")? as u64,
                mean_salience: r.f64("mean_salience")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaStore;
    use crate::queries::memory_ops;
    use engram_core::models::MemoryRecord;

    #[tokio::test]
    async fn stats_group_by_sector() {
        let store = MetaStore::open_in_memory().await.unwrap();
        for (content, sector) in [
            ("a", Sector::Episodic),
            ("b", Sector::Episodic),
            ("c", Sector::Emotional),
        ] {
            let mut m = MemoryRecord::new(content, Some("alice".into()));
            m.primary_sector = sector;
            memory_ops::insert_memory(&store, &m).await.unwrap();
        }

        let ctx = SecurityContext::for_user("alice");
        let mut stats = sector_stats(&store, &ctx, false).await.unwrap();
        stats.sort_by_key(|s| s.sector.index());
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].sector, Sector::Episodic);
        assert_eq!(stats[0].count, 2);
        assert!((stats[0].mean_salience - 0.5).abs() < 1e-9);
    }
}
