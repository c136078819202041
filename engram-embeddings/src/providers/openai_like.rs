use serde::Deserialize;
use serde_json::json;

use engram_core::errors::EmbeddingError;
use engram_core::traits::EmbeddingProvider;

use super::{http_client, status_error, transport_error};

/// Provider speaking the `/v1/embeddings` dialect: one JSON request with
/// an `input` array, one `data[i].embedding` per input.
pub struct OpenAiLikeProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl OpenAiLikeProvider {
    pub fn new(base_url: String, model: String, api_key: Option<String>, dim: usize) -> Self {
        Self {
            client: http_client(),
            base_url,
            model,
            api_key,
            dim,
        }
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let mut req = self.client.post(&url).json(&json!({
            "model": self.model,
            "input": inputs,
        }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let body: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse {
                reason: e.to_string(),
            })?;
        if body.data.len() != inputs.len() {
            return Err(EmbeddingError::InvalidResponse {
                reason: format!(
                    "expected {} embeddings, got {}",
                    inputs.len(),
                    body.data.len()
                ),
            });
        }
        Ok(body.data.into_iter().map(|r| r.embedding).collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiLikeProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut out = self.request(std::slice::from_ref(&text.to_string())).await?;
        out.pop().ok_or(EmbeddingError::InvalidResponse {
            reason: "empty data array".into(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "openai-like"
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn parallel_safe(&self) -> bool {
        true
    }
}
