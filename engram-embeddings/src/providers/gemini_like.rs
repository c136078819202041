use serde::Deserialize;
use serde_json::json;

use engram_core::errors::EmbeddingError;
use engram_core::traits::EmbeddingProvider;

use super::{http_client, status_error, transport_error};

/// Provider speaking the `batchEmbedContents` dialect. Declared not
/// parallel-safe: these endpoints enforce strict per-key rate limits, so
/// advanced mode drives it sequentially.
pub struct GeminiLikeProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dim: usize,
}

#[derive(Deserialize)]
struct BatchResponse {
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiLikeProvider {
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
        let mut url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        if let Some(key) = &self.api_key {
            url.push_str(&format!("?key={key}"));
        }

        let requests: Vec<_> = inputs
            .iter()
            .map(|text| {
                json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();

        let resp = self
            .client
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let body: BatchResponse = resp
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
        Ok(body.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for GeminiLikeProvider {
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
        "gemini-like"
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn parallel_safe(&self) -> bool {
        false
    }
}
