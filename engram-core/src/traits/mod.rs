//! Trait seams between the crates.

mod embed_log_sink;
mod embedding;
mod vector_store;

pub use embed_log_sink::{EmbedLogSink, NullEmbedLogSink};
pub use embedding::EmbeddingProvider;
pub use vector_store::{SectorVector, VectorHit, VectorStore};
