//! KV vector backend: sled records with an optional HNSW index.
//!
//! Each vector is an independent record keyed `vec:{sector}:{id}`. The
//! payload is bincode `{v: raw LE bytes, dim, user_id}` so the binary
//! blob round-trips without encoding loss. With the `hnsw` feature a
//! per-sector usearch index accelerates KNN; any index failure drops to
//! the paged scan (warned once), which is always correct.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use engram_core::constants::SCAN_WARN_ROWS;
use engram_core::context::SecurityContext;
use engram_core::errors::{EngramResult, StorageError};
use engram_core::sector::Sector;
use engram_core::traits::{SectorVector, VectorHit, VectorStore};
use engram_vector::codec::{bytes_to_vec, vec_to_bytes};
use engram_vector::ops::cosine;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::rank_hits;

#[derive(Serialize, Deserialize)]
struct VecRecord {
    /// Raw little-endian f32 bytes.
    v: Vec<u8>,
    dim: u32,
    user_id: Option<String>,
}

pub struct KvVectorStore {
    db: sled::Db,
    tree: sled::Tree,
    strict_tenant: bool,
    scan_warned: AtomicBool,
    #[cfg(feature = "hnsw")]
    index: hnsw_index::SectorIndexes,
}

impl KvVectorStore {
    /// Open at `path`, or as a temporary store when none is given.
    pub fn open(path: Option<&Path>, strict_tenant: bool) -> EngramResult<Self> {
        let db = match path {
            Some(p) => sled::open(p.join("vectors.sled")).map_err(kv_err)?,
            None => sled::Config::new().temporary(true).open().map_err(kv_err)?,
        };
        let tree = db.open_tree("vectors").map_err(kv_err)?;

        #[cfg(feature = "hnsw")]
        let index = hnsw_index::SectorIndexes::build(&db, &tree)?;

        Ok(Self {
            db,
            tree,
            strict_tenant,
            scan_warned: AtomicBool::new(false),
            #[cfg(feature = "hnsw")]
            index,
        })
    }

    fn key(sector: Sector, id: &str) -> Vec<u8> {
        format!("vec:{}:{id}", sector.as_str()).into_bytes()
    }

    fn sector_prefix(sector: Sector) -> Vec<u8> {
        format!("vec:{}:", sector.as_str()).into_bytes()
    }

    fn decode(id: &str, sector: Sector, bytes: &[u8]) -> EngramResult<SectorVector> {
        let record: VecRecord = bincode::deserialize(bytes)
            .map_err(|e| kv_err(format!("corrupt vector record {id}: {e}")))?;
        let v = bytes_to_vec(&record.v)?;
        if v.len() != record.dim as usize {
            return Err(engram_core::errors::EngramError::internal(format!(
                "stored vector length {} does not match dim {}",
                v.len(),
                record.dim
            )));
        }
        Ok(SectorVector {
            memory_id: id.to_string(),
            sector,
            user_id: record.user_id,
            v,
        })
    }

    /// Whether the caller may see a record owned by `owner`.
    fn visible(ctx: &SecurityContext, owner: Option<&str>) -> bool {
        ctx.admin || owner.is_none() || ctx.user_id.as_deref() == owner
    }

    fn check_strict(&self, ctx: &SecurityContext) -> EngramResult<()> {
        if self.strict_tenant && !ctx.admin && ctx.user_id.is_none() {
            return Err(engram_core::errors::EngramError::bad_request(
                "tenant-less read rejected (strict_tenant)",
            ));
        }
        Ok(())
    }

    /// Paged cursor over `vec:{sector}:*`, hydrate, cosine, top-k.
    fn scan_similar(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        query: &[f32],
        top_k: usize,
    ) -> EngramResult<Vec<VectorHit>> {
        let prefix = Self::sector_prefix(sector);
        let mut hits = Vec::new();
        let mut scanned = 0usize;

        for kv in self.tree.scan_prefix(&prefix) {
            let (key, value) = kv.map_err(kv_err)?;
            scanned += 1;
            let id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let record = Self::decode(&id, sector, &value)?;
            if !Self::visible(ctx, record.user_id.as_deref()) {
                continue;
            }
            if record.v.len() != query.len() {
                continue;
            }
            hits.push(VectorHit {
                memory_id: id,
                similarity: cosine(query, &record.v)?,
            });
        }

        if scanned > SCAN_WARN_ROWS && !self.scan_warned.swap(true, Ordering::Relaxed) {
            warn!(sector = %sector, rows = scanned, "KV vector scan over a large sector");
        }
        Ok(rank_hits(hits, top_k))
    }
}

#[async_trait::async_trait]
impl VectorStore for KvVectorStore {
    async fn store(&self, ctx: &SecurityContext, vector: SectorVector) -> EngramResult<()> {
        ctx.ensure_acting_for(vector.user_id.as_deref())?;
        let record = VecRecord {
            v: vec_to_bytes(&vector.v),
            dim: vector.v.len() as u32,
            user_id: vector.user_id.clone(),
        };
        let bytes = bincode::serialize(&record).map_err(|e| kv_err(e.to_string()))?;
        self.tree
            .insert(Self::key(vector.sector, &vector.memory_id), bytes)
            .map_err(kv_err)?;

        #[cfg(feature = "hnsw")]
        self.index.upsert(vector.sector, &vector.memory_id, &vector.v);

        Ok(())
    }

    async fn delete(&self, _ctx: &SecurityContext, id: &str, sector: Sector) -> EngramResult<()> {
        self.tree.remove(Self::key(sector, id)).map_err(kv_err)?;
        #[cfg(feature = "hnsw")]
        self.index.remove(sector, id);
        Ok(())
    }

    async fn delete_all(&self, ctx: &SecurityContext, id: &str) -> EngramResult<()> {
        for sector in Sector::ALL {
            self.delete(ctx, id, sector).await?;
        }
        Ok(())
    }

    async fn get(
        &self,
        ctx: &SecurityContext,
        id: &str,
        sector: Sector,
    ) -> EngramResult<Option<SectorVector>> {
        self.check_strict(ctx)?;
        let Some(bytes) = self.tree.get(Self::key(sector, id)).map_err(kv_err)? else {
            return Ok(None);
        };
        let record = Self::decode(id, sector, &bytes)?;
        if Self::visible(ctx, record.user_id.as_deref()) {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }

    async fn by_memory(&self, ctx: &SecurityContext, id: &str) -> EngramResult<Vec<SectorVector>> {
        let mut out = Vec::new();
        for sector in Sector::ALL {
            if let Some(v) = self.get(ctx, id, sector).await? {
                out.push(v);
            }
        }
        Ok(out)
    }

    async fn by_sector(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
    ) -> EngramResult<Vec<SectorVector>> {
        self.check_strict(ctx)?;
        let prefix = Self::sector_prefix(sector);
        let mut out = Vec::new();
        for kv in self.tree.scan_prefix(&prefix) {
            let (key, value) = kv.map_err(kv_err)?;
            let id = String::from_utf8_lossy(&key[prefix.len()..]).into_owned();
            let record = Self::decode(&id, sector, &value)?;
            if Self::visible(ctx, record.user_id.as_deref()) {
                out.push(record);
            }
        }
        Ok(out)
    }

    async fn by_ids(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        ids: &[String],
    ) -> EngramResult<Vec<SectorVector>> {
        let mut out = Vec::new();
        for id in ids {
            if let Some(v) = self.get(ctx, id, sector).await? {
                out.push(v);
            }
        }
        Ok(out)
    }

    async fn search_similar(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        query: &[f32],
        top_k: usize,
    ) -> EngramResult<Vec<VectorHit>> {
        self.check_strict(ctx)?;

        #[cfg(feature = "hnsw")]
        {
            match self.index.search(sector, query, top_k, |id| {
                // Post-filter by tenant: hydrate the record and check.
                self.tree
                    .get(Self::key(sector, id))
                    .ok()
                    .flatten()
                    .and_then(|bytes| Self::decode(id, sector, &bytes).ok())
                    .map(|r| Self::visible(ctx, r.user_id.as_deref()))
                    .unwrap_or(false)
            }) {
                Ok(hits) => return Ok(hits),
                Err(e) => {
                    if !self.scan_warned.swap(true, Ordering::Relaxed) {
                        warn!(error = %e, "HNSW query failed, falling back to scan");
                    }
                }
            }
        }

        self.scan_similar(ctx, sector, query, top_k)
    }

    async fn flush(&self) -> EngramResult<()> {
        self.db.flush().map_err(kv_err)?;
        Ok(())
    }
}

fn kv_err(message: impl ToString) -> engram_core::errors::EngramError {
    StorageError::Kv {
        message: message.to_string(),
    }
    .into()
}

/// Per-sector usearch indexes with sled-persisted id maps.
#[cfg(feature = "hnsw")]
mod hnsw_index {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use engram_core::sector::Sector;
    use engram_core::traits::VectorHit;
    use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

    use super::kv_err;

    pub struct SectorIndexes {
        db: sled::Db,
        inner: Mutex<HashMap<Sector, Index>>,
    }

    impl SectorIndexes {
        /// Build indexes from the existing records.
        pub fn build(
            db: &sled::Db,
            tree: &sled::Tree,
        ) -> engram_core::errors::EngramResult<Self> {
            let indexes = Self {
                db: db.clone(),
                inner: Mutex::new(HashMap::new()),
            };
            for kv in tree.iter() {
                let (key, value) = kv.map_err(kv_err)?;
                let key_str = String::from_utf8_lossy(&key).into_owned();
                let mut parts = key_str.splitn(3, ':');
                let (Some(_), Some(sector_str), Some(id)) =
                    (parts.next(), parts.next(), parts.next())
                else {
                    continue;
                };
                let Some(sector) = Sector::parse(sector_str) else {
                    continue;
                };
                if let Ok(record) = bincode::deserialize::<super::VecRecord>(&value) {
                    if let Ok(v) = engram_vector::codec::bytes_to_vec(&record.v) {
                        indexes.upsert(sector, id, &v);
                    }
                }
            }
            Ok(indexes)
        }

        fn ensure_index<'a>(
            map: &'a mut HashMap<Sector, Index>,
            sector: Sector,
            dim: usize,
        ) -> Option<&'a Index> {
            if !map.contains_key(&sector) {
                let options = IndexOptions {
                    dimensions: dim,
                    metric: MetricKind::Cos,
                    quantization: ScalarKind::F32,
                    ..Default::default()
                };
                let index = Index::new(&options).ok()?;
                index.reserve(1024).ok()?;
                map.insert(sector, index);
            }
            map.get(&sector)
        }

        /// Numeric key for an id, persisted so index keys stay stable
        /// across restarts.
        fn numeric_key(&self, sector: Sector, id: &str) -> Option<u64> {
            let map_tree = self
                .db
                .open_tree(format!("idmap:{}", sector.as_str()))
                .ok()?;
            let key = id.as_bytes();
            if let Ok(Some(existing)) = map_tree.get(key) {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&existing);
                return Some(u64::from_le_bytes(buf));
            }
            let next = self.db.generate_id().ok()?;
            map_tree.insert(key, &next.to_le_bytes()).ok()?;
            self.db
                .open_tree(format!("idrev:{}", sector.as_str()))
                .ok()?
                .insert(next.to_le_bytes(), key)
                .ok()?;
            Some(next)
        }

        /// Best-effort: index failures degrade to the scan path.
        pub fn upsert(&self, sector: Sector, id: &str, v: &[f32]) {
            let Some(key) = self.numeric_key(sector, id) else {
                return;
            };
            let mut map = self.inner.lock().unwrap();
            if let Some(index) = Self::ensure_index(&mut map, sector, v.len()) {
                if index.size() + 1 > index.capacity() {
                    let _ = index.reserve(index.capacity() * 2);
                }
                let _ = index.remove(key);
                let _ = index.add(key, v);
            }
        }

        pub fn remove(&self, sector: Sector, id: &str) {
            let Some(key) = self.numeric_key(sector, id) else {
                return;
            };
            let map = self.inner.lock().unwrap();
            if let Some(index) = map.get(&sector) {
                let _ = index.remove(key);
            }
        }

        /// Native KNN, over-fetching so the tenant post-filter can drop
        /// foreign hits without starving the result.
        pub fn search(
            &self,
            sector: Sector,
            query: &[f32],
            top_k: usize,
            mut visible: impl FnMut(&str) -> bool,
        ) -> engram_core::errors::EngramResult<Vec<VectorHit>> {
            let map = self.inner.lock().unwrap();
            let index = map
                .get(&sector)
                .ok_or_else(|| kv_err("no index for sector"))?;

            let matches = index
                .search(query, (top_k * 4).max(top_k))
                .map_err(|e| kv_err(e.to_string()))?;

            let rev = self
                .db
                .open_tree(format!("idrev:{}", sector.as_str()))
                .map_err(kv_err)?;

            let mut hits = Vec::new();
            for (key, distance) in matches.keys.iter().zip(matches.distances.iter()) {
                let Some(id_bytes) = rev.get(key.to_le_bytes()).map_err(kv_err)? else {
                    continue;
                };
                let id = String::from_utf8_lossy(&id_bytes).into_owned();
                if !visible(&id) {
                    continue;
                }
                hits.push(VectorHit {
                    memory_id: id,
                    similarity: 1.0 - *distance,
                });
                if hits.len() == top_k {
                    break;
                }
            }
            Ok(hits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> SecurityContext {
        SecurityContext::admin()
    }

    #[tokio::test]
    async fn roundtrip_is_bit_exact() {
        let store = KvVectorStore::open(None, false).unwrap();
        let v = vec![0.1f32, f32::MIN_POSITIVE, -0.0, 1.5e-30];
        store
            .store(
                &admin(),
                SectorVector {
                    memory_id: "m1".into(),
                    sector: Sector::Episodic,
                    user_id: Some("alice".into()),
                    v: v.clone(),
                },
            )
            .await
            .unwrap();

        let got = store
            .get(&SecurityContext::for_user("alice"), "m1", Sector::Episodic)
            .await
            .unwrap()
            .unwrap();
        for (a, b) in v.iter().zip(got.v.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[tokio::test]
    async fn scan_search_ranks_and_scopes() {
        let store = KvVectorStore::open(None, false).unwrap();
        for (id, user, v) in [
            ("close", Some("alice"), vec![1.0f32, 0.1]),
            ("far", Some("alice"), vec![-1.0, 0.2]),
            ("foreign", Some("bob"), vec![1.0, 0.0]),
        ] {
            store
                .store(
                    &admin(),
                    SectorVector {
                        memory_id: id.into(),
                        sector: Sector::Semantic,
                        user_id: user.map(String::from),
                        v,
                    },
                )
                .await
                .unwrap();
        }

        let ctx = SecurityContext::for_user("alice");
        let hits = store
            .search_similar(&ctx, Sector::Semantic, &[1.0, 0.0], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].memory_id, "close");
    }

    #[tokio::test]
    async fn delete_all_clears_every_sector() {
        let store = KvVectorStore::open(None, false).unwrap();
        for sector in [Sector::Semantic, Sector::Emotional] {
            store
                .store(
                    &admin(),
                    SectorVector {
                        memory_id: "m1".into(),
                        sector,
                        user_id: None,
                        v: vec![1.0],
                    },
                )
                .await
                .unwrap();
        }
        store.delete_all(&admin(), "m1").await.unwrap();
        assert!(store.by_memory(&admin(), "m1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn strict_tenant_rejects_anonymous_search() {
        let store = KvVectorStore::open(None, true).unwrap();
        let err = store
            .search_similar(&SecurityContext::anonymous(), Sector::Semantic, &[1.0], 5)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "bad_request");
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = KvVectorStore::open(Some(dir.path()), false).unwrap();
            store
                .store(
                    &admin(),
                    SectorVector {
                        memory_id: "m1".into(),
                        sector: Sector::Semantic,
                        user_id: None,
                        v: vec![0.25, 0.75],
                    },
                )
                .await
                .unwrap();
        }
        let store = KvVectorStore::open(Some(dir.path()), false).unwrap();
        let got = store.get(&admin(), "m1", Sector::Semantic).await.unwrap();
        assert_eq!(got.unwrap().v, vec![0.25, 0.75]);
    }
}
