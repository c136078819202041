use serde::Deserialize;
use serde_json::json;

use engram_core::errors::EmbeddingError;
use engram_core::traits::EmbeddingProvider;

use super::{http_client, status_error, transport_error};

/// Provider speaking the local `/api/embed` dialect. No batching on the
/// wire worth the name, so the orchestrator drives it per-sector
/// (advanced mode); sequential because a local model serves one request
/// at a time anyway.
pub struct OllamaLikeProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dim: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaLikeProvider {
    pub fn new(base_url: String, model: String, dim: usize) -> Self {
        Self {
            client: http_client(),
            base_url,
            model,
            dim,
        }
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": inputs }))
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse {
                reason: e.to_string(),
            })?;
        if body.embeddings.len() != inputs.len() {
            return Err(EmbeddingError::InvalidResponse {
                reason: format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    body.embeddings.len()
                ),
            });
        }
        Ok(body.embeddings)
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OllamaLikeProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.request(std::slice::from_ref(&text.to_string())).await?;
        out.pop().ok_or(EmbeddingError::InvalidResponse {
            reason: "empty embeddings array".into(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "ollama-like"
    }

    fn supports_batch(&self) -> bool {
        false
    }

    fn parallel_safe(&self) -> bool {
        false
    }
}
