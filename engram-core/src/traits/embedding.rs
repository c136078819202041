use crate::errors::EmbeddingError;

/// Embedding generation provider.
///
/// Provider calls are suspension points: remote providers go over HTTP,
/// the synthetic provider returns immediately. Errors use
/// [`EmbeddingError`] so the orchestrator can tell retryable failures
/// from terminal ones.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text, returning a vector of floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed a batch of texts in one request.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// The native dimensionality of this provider's vectors.
    fn dimensions(&self) -> usize;

    /// Human-readable provider name (shows up in embed-log rows).
    fn name(&self) -> &str;

    /// Whether the provider accepts one batch request for many texts.
    /// Providers without native batching are driven per-sector.
    fn supports_batch(&self) -> bool {
        true
    }

    /// Whether concurrent requests against this provider are safe.
    /// Providers with strict per-key rate limits return false.
    fn parallel_safe(&self) -> bool {
        false
    }
}
