use engram_core::errors::EmbeddingError;
use engram_core::sector::Sector;
use engram_core::traits::EmbeddingProvider;

use crate::synthetic::SyntheticEmbedder;

/// The deterministic embedder wearing the provider interface.
///
/// Sector-neutral at this seam: the orchestrator prefixes sector labels
/// onto the text the same way it does for remote providers, and calls
/// [`SyntheticEmbedder`] directly when it wants sector-aware vectors.
pub struct SyntheticProvider {
    embedder: SyntheticEmbedder,
    dim: usize,
    name: &'static str,
}

impl SyntheticProvider {
    pub fn new(dim: usize, name: &'static str) -> Self {
        Self {
            embedder: SyntheticEmbedder::new(),
            dim,
            name,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for SyntheticProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.embedder.embed(text, Sector::Semantic, self.dim))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts
            .iter()
            .map(|t| self.embedder.embed(t, Sector::Semantic, self.dim))
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        self.name
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn parallel_safe(&self) -> bool {
        true
    }
}
