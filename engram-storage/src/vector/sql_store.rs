//! SQL vector backend: rows in the metadata database.
//!
//! `(memory_id, sector)` composite key, vectors as little-endian f32
//! blobs. On Postgres with a pgvector-typed column, KNN runs natively;
//! everywhere else a scan computes cosine in process. The scan warns
//! (but still answers completely) past 10 000 candidate rows.

use std::sync::Arc;

use engram_core::constants::SCAN_WARN_ROWS;
use engram_core::context::SecurityContext;
use engram_core::errors::EngramResult;
use engram_core::sector::Sector;
use engram_core::traits::{SectorVector, VectorHit, VectorStore};
use engram_vector::codec::{bytes_to_vec, vec_to_bytes};
use engram_vector::ops::cosine;
use tracing::{debug, warn};

use crate::meta::MetaStore;
use crate::params;
use crate::sql::{SqlDialect, SqlExecutor, SqlRow, SqlValue};
use crate::tenant;

use super::rank_hits;

pub struct SqlVectorStore {
    meta: Arc<MetaStore>,
    strict_tenant: bool,
    /// True when the server backend has a native vector column.
    pgvector: bool,
}

impl SqlVectorStore {
    /// Probe for a vector-typed column, then serve.
    pub async fn open(meta: Arc<MetaStore>, strict_tenant: bool) -> EngramResult<Self> {
        let pgvector = match meta.dialect() {
            SqlDialect::Sqlite => false,
            SqlDialect::Postgres => {
                let row = meta
                    .get(
                        "SELECT udt_name FROM information_schema.columns
                         WHERE table_name = 'sector_vectors' AND column_name = 'v'",
                        &[],
                    )
                    .await?;
                row.and_then(|r| r.str("udt_name").ok())
                    .map(|t| t == "vector")
                    .unwrap_or(false)
            }
        };
        if pgvector {
            debug!("pgvector column detected, using native KNN");
        }
        Ok(Self {
            meta,
            strict_tenant,
            pgvector,
        })
    }

    fn row_to_vector(row: &SqlRow) -> EngramResult<SectorVector> {
        let blob = row.blob("v")?;
        let v = bytes_to_vec(&blob)?;
        let dim = row.i64("dim")? as usize;
        if v.len() != dim {
            return Err(engram_core::errors::EngramError::internal(format!(
                "stored vector length {} does not match dim {dim}",
                v.len()
            )));
        }
        Ok(SectorVector {
            memory_id: row.str("memory_id")?,
            sector: Sector::parse_or_semantic(&row.str("sector")?),
            user_id: row.opt_str("user_id")?,
            v,
        })
    }

    async fn knn_native(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        query: &[f32],
        top_k: usize,
    ) -> EngramResult<Vec<VectorHit>> {
        let literal = format!(
            "[{}]",
            query
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(",")
        );
        // Cosine distance keeps the similarity contract of this trait;
        // hits are 1 - distance.
        let mut sql = String::from(
            "SELECT memory_id, 1 - (v <=> ?::vector) AS similarity
             FROM sector_vectors WHERE sector = ?",
        );
        let mut params = params![literal, sector.as_str()];
        if let Some(user) = ctx.scope() {
            sql.push_str(" AND (user_id = ? OR user_id IS NULL)");
            params.push(SqlValue::from(user));
        }
        sql.push_str(" ORDER BY v <=> ?::vector LIMIT ?");
        params.push(SqlValue::from(
            format!(
                "[{}]",
                query
                    .iter()
                    .map(|x| x.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            ),
        ));
        params.push(SqlValue::from(top_k));

        let rows = self.meta.all(&sql, &params).await?;
        rows.iter()
            .map(|r| {
                Ok(VectorHit {
                    memory_id: r.str("memory_id")?,
                    similarity: r.f64("similarity")? as f32,
                })
            })
            .collect()
    }

    async fn knn_scan(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        query: &[f32],
        top_k: usize,
    ) -> EngramResult<Vec<VectorHit>> {
        let candidates = self.by_sector(ctx, sector).await?;
        if candidates.len() > SCAN_WARN_ROWS {
            warn!(
                sector = %sector,
                rows = candidates.len(),
                "vector scan over a large candidate set"
            );
        }

        let mut hits = Vec::with_capacity(candidates.len());
        for c in &candidates {
            if c.v.len() != query.len() {
                continue;
            }
            let sim = cosine(query, &c.v)?;
            hits.push(VectorHit {
                memory_id: c.memory_id.clone(),
                similarity: sim,
            });
        }
        Ok(rank_hits(hits, top_k))
    }
}

#[async_trait::async_trait]
impl VectorStore for SqlVectorStore {
    async fn store(&self, ctx: &SecurityContext, vector: SectorVector) -> EngramResult<()> {
        ctx.ensure_acting_for(vector.user_id.as_deref())?;
        self.meta
            .run(
                "INSERT INTO sector_vectors (memory_id, sector, user_id, v, dim)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT (memory_id, sector) DO UPDATE SET
                    user_id = excluded.user_id,
                    v = excluded.v,
                    dim = excluded.dim",
                &params![
                    vector.memory_id.as_str(),
                    vector.sector.as_str(),
                    vector.user_id.as_deref(),
                    vec_to_bytes(&vector.v),
                    vector.v.len(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn delete(&self, _ctx: &SecurityContext, id: &str, sector: Sector) -> EngramResult<()> {
        self.meta
            .run(
                "DELETE FROM sector_vectors WHERE memory_id = ? AND sector = ?",
                &params![id, sector.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn delete_all(&self, _ctx: &SecurityContext, id: &str) -> EngramResult<()> {
        self.meta
            .run("DELETE FROM sector_vectors WHERE memory_id = ?", &params![id])
            .await?;
        Ok(())
    }

    async fn get(
        &self,
        ctx: &SecurityContext,
        id: &str,
        sector: Sector,
    ) -> EngramResult<Option<SectorVector>> {
        let filter = tenant::read_filter(ctx, self.strict_tenant, "user_id")?;
        let mut params = params![id, sector.as_str()];
        params.extend(filter.params);

        let row = self
            .meta
            .get(
                &format!(
                    "SELECT memory_id, sector, user_id, v, dim FROM sector_vectors
                     WHERE memory_id = ? AND sector = ?{}",
                    filter.clause
                ),
                &params,
            )
            .await?;
        row.map(|r| Self::row_to_vector(&r)).transpose()
    }

    async fn by_memory(&self, ctx: &SecurityContext, id: &str) -> EngramResult<Vec<SectorVector>> {
        let filter = tenant::read_filter(ctx, self.strict_tenant, "user_id")?;
        let mut params = params![id];
        params.extend(filter.params);

        let rows = self
            .meta
            .all(
                &format!(
                    "SELECT memory_id, sector, user_id, v, dim FROM sector_vectors
                     WHERE memory_id = ?{}",
                    filter.clause
                ),
                &params,
            )
            .await?;
        rows.iter().map(Self::row_to_vector).collect()
    }

    async fn by_sector(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
    ) -> EngramResult<Vec<SectorVector>> {
        let filter = tenant::read_filter(ctx, self.strict_tenant, "user_id")?;
        let mut params = params![sector.as_str()];
        params.extend(filter.params);

        let rows = self
            .meta
            .all(
                &format!(
                    "SELECT memory_id, sector, user_id, v, dim FROM sector_vectors
                     WHERE sector = ?{}",
                    filter.clause
                ),
                &params,
            )
            .await?;
        rows.iter().map(Self::row_to_vector).collect()
    }

    async fn by_ids(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        ids: &[String],
    ) -> EngramResult<Vec<SectorVector>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let filter = tenant::read_filter(ctx, self.strict_tenant, "user_id")?;
        let mut params: Vec<SqlValue> = params![sector.as_str()];
        params.extend(ids.iter().map(|i| SqlValue::from(i.as_str())));
        params.extend(filter.params);

        let rows = self
            .meta
            .all(
                &format!(
                    "SELECT memory_id, sector, user_id, v, dim FROM sector_vectors
                     WHERE sector = ? AND memory_id IN ({}){}",
                    crate::queries::in_placeholders(ids.len()),
                    filter.clause
                ),
                &params,
            )
            .await?;
        rows.iter().map(Self::row_to_vector).collect()
    }

    async fn search_similar(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        query: &[f32],
        top_k: usize,
    ) -> EngramResult<Vec<VectorHit>> {
        if self.pgvector {
            match self.knn_native(ctx, sector, query, top_k).await {
                Ok(hits) => return Ok(hits),
                Err(e) => {
                    warn!(error = %e, "native KNN failed, falling back to scan");
                }
            }
        }
        self.knn_scan(ctx, sector, query, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with(
        vectors: &[(&str, Sector, Option<&str>, Vec<f32>)],
    ) -> (SqlVectorStore, SecurityContext) {
        let meta = Arc::new(MetaStore::open_in_memory().await.unwrap());
        let store = SqlVectorStore::open(meta, false).await.unwrap();
        let admin = SecurityContext::admin();
        for (id, sector, user, v) in vectors {
            store
                .store(
                    &admin,
                    SectorVector {
                        memory_id: id.to_string(),
                        sector: *sector,
                        user_id: user.map(String::from),
                        v: v.clone(),
                    },
                )
                .await
                .unwrap();
        }
        (store, admin)
    }

    #[tokio::test]
    async fn store_and_get_roundtrip_bits() {
        let v = vec![0.1f32, -0.5, 3.25e-7];
        let (store, admin) = store_with(&[("m1", Sector::Semantic, Some("alice"), v.clone())]).await;

        let got = store
            .get(&admin, "m1", Sector::Semantic)
            .await
            .unwrap()
            .unwrap();
        for (a, b) in v.iter().zip(got.v.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[tokio::test]
    async fn upsert_replaces() {
        let (store, admin) = store_with(&[("m1", Sector::Semantic, None, vec![1.0, 0.0])]).await;
        store
            .store(
                &admin,
                SectorVector {
                    memory_id: "m1".into(),
                    sector: Sector::Semantic,
                    user_id: None,
                    v: vec![0.0, 1.0],
                },
            )
            .await
            .unwrap();
        let got = store.get(&admin, "m1", Sector::Semantic).await.unwrap().unwrap();
        assert_eq!(got.v, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn search_orders_by_cosine() {
        let (store, _) = store_with(&[
            ("close", Sector::Semantic, Some("alice"), vec![1.0, 0.05]),
            ("medium", Sector::Semantic, Some("alice"), vec![0.6, 0.8]),
            ("far", Sector::Semantic, Some("alice"), vec![-1.0, 0.0]),
        ])
        .await;

        let ctx = SecurityContext::for_user("alice");
        let hits = store
            .search_similar(&ctx, Sector::Semantic, &[1.0, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory_id, "close");
        assert_eq!(hits[1].memory_id, "medium");
    }

    #[tokio::test]
    async fn search_is_tenant_scoped() {
        let (store, _) = store_with(&[
            ("mine", Sector::Semantic, Some("alice"), vec![1.0, 0.0]),
            ("theirs", Sector::Semantic, Some("bob"), vec![1.0, 0.0]),
        ])
        .await;

        let ctx = SecurityContext::for_user("alice");
        let hits = store
            .search_similar(&ctx, Sector::Semantic, &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory_id, "mine");
    }

    #[tokio::test]
    async fn delete_all_removes_every_sector() {
        let (store, admin) = store_with(&[
            ("m1", Sector::Semantic, None, vec![1.0]),
            ("m1", Sector::Emotional, None, vec![1.0]),
        ])
        .await;
        store.delete_all(&admin, "m1").await.unwrap();
        assert!(store.by_memory(&admin, "m1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tenant_cannot_store_for_other_user() {
        let (store, _) = store_with(&[]).await;
        let ctx = SecurityContext::for_user("alice");
        let err = store
            .store(
                &ctx,
                SectorVector {
                    memory_id: "m1".into(),
                    sector: Sector::Semantic,
                    user_id: Some("bob".into()),
                    v: vec![1.0],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "forbidden");
    }
}
