//! Vector store backends behind the [`VectorStore`] trait.
//!
//! `SqlVectorStore` keeps vectors as rows next to the metadata;
//! `KvVectorStore` keeps independent KV records with an optional HNSW
//! index. Both uphold the same contract: tenant scoping, bit-exact blob
//! round-trips, cascade deletes.
//!
//! [`VectorStore`]: engram_core::traits::VectorStore

mod kv_store;
mod sql_store;

pub use kv_store::KvVectorStore;
pub use sql_store::SqlVectorStore;

use engram_core::traits::VectorHit;

/// Shared scan scoring: cosine against every candidate, descending
/// partial sort, top-k.
pub(crate) fn rank_hits(mut hits: Vec<VectorHit>, top_k: usize) -> Vec<VectorHit> {
    hits.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}
