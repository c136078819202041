use crate::context::SecurityContext;
use crate::errors::EngramResult;
use crate::sector::Sector;

/// One persisted sector vector.
#[derive(Debug, Clone)]
pub struct SectorVector {
    pub memory_id: String,
    pub sector: Sector,
    pub user_id: Option<String>,
    pub v: Vec<f32>,
}

/// A KNN hit: memory id plus cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub memory_id: String,
    pub similarity: f32,
}

/// Per-sector vector persistence and KNN, tenant-scoped throughout.
///
/// Invariants the implementations uphold:
/// - dim is uniform under one (user, sector) pair;
/// - binary payloads round-trip bit-exactly;
/// - deleting a memory deletes all its vectors.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert by (memory id, sector).
    async fn store(&self, ctx: &SecurityContext, vector: SectorVector) -> EngramResult<()>;

    async fn delete(&self, ctx: &SecurityContext, id: &str, sector: Sector) -> EngramResult<()>;

    /// Remove every sector vector for a memory.
    async fn delete_all(&self, ctx: &SecurityContext, id: &str) -> EngramResult<()>;

    async fn get(
        &self,
        ctx: &SecurityContext,
        id: &str,
        sector: Sector,
    ) -> EngramResult<Option<SectorVector>>;

    /// All vectors stored for one memory.
    async fn by_memory(&self, ctx: &SecurityContext, id: &str) -> EngramResult<Vec<SectorVector>>;

    /// All vectors in a sector visible to the caller.
    async fn by_sector(&self, ctx: &SecurityContext, sector: Sector)
        -> EngramResult<Vec<SectorVector>>;

    /// Vectors for a set of memories in one sector.
    async fn by_ids(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        ids: &[String],
    ) -> EngramResult<Vec<SectorVector>>;

    /// Top-k ids by cosine similarity to `query` within a sector.
    async fn search_similar(
        &self,
        ctx: &SecurityContext,
        sector: Sector,
        query: &[f32],
        top_k: usize,
    ) -> EngramResult<Vec<VectorHit>>;

    /// Persist buffered writes. A no-op for backends that write through.
    async fn flush(&self) -> EngramResult<()> {
        Ok(())
    }
}
