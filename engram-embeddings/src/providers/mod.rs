//! Embedding provider family.
//!
//! Remote providers share the reqwest client conventions (JSON bodies,
//! 30 s soft timeout, rate-limit surfacing); the synthetic provider backs
//! tier fast and every terminal-failure fallback.

mod gemini_like;
mod ollama_like;
mod openai_like;
mod synthetic_provider;

pub use gemini_like::GeminiLikeProvider;
pub use ollama_like::OllamaLikeProvider;
pub use openai_like::OpenAiLikeProvider;
pub use synthetic_provider::SyntheticProvider;

use std::time::Duration;

use engram_core::config::{EmbedConfig, EmbedKind};
use engram_core::constants::PROVIDER_TIMEOUT_SECS;
use engram_core::errors::EmbeddingError;
use engram_core::traits::EmbeddingProvider;

/// Build the configured provider. Synthetic and local kinds never touch
/// the network; remote kinds require a base URL.
pub fn create_provider(
    config: &EmbedConfig,
    dim: usize,
) -> Result<Box<dyn EmbeddingProvider>, EmbeddingError> {
    match config.kind {
        EmbedKind::Synthetic => Ok(Box::new(SyntheticProvider::new(dim, "synthetic"))),
        // The on-device runtime is an external collaborator; its stand-in
        // is the deterministic embedder under a distinct name so log rows
        // and tests can tell the paths apart.
        EmbedKind::Local => Ok(Box::new(SyntheticProvider::new(dim, "local"))),
        EmbedKind::OpenaiLike => {
            let base = require_base_url(config)?;
            Ok(Box::new(OpenAiLikeProvider::new(
                base,
                config.model.clone(),
                config.api_key.clone(),
                dim,
            )))
        }
        EmbedKind::GeminiLike => {
            let base = require_base_url(config)?;
            Ok(Box::new(GeminiLikeProvider::new(
                base,
                config.model.clone(),
                config.api_key.clone(),
                dim,
            )))
        }
        EmbedKind::OllamaLike => {
            let base = require_base_url(config)?;
            Ok(Box::new(OllamaLikeProvider::new(
                base,
                config.model.clone(),
                dim,
            )))
        }
    }
}

fn require_base_url(config: &EmbedConfig) -> Result<String, EmbeddingError> {
    config
        .base_url
        .clone()
        .ok_or_else(|| EmbeddingError::ProviderUnavailable {
            provider: format!("{:?} (no base_url configured)", config.kind),
        })
}

/// Shared reqwest client with the soft provider timeout.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

/// Map a transport failure onto the error taxonomy.
pub(crate) fn transport_error(e: reqwest::Error) -> EmbeddingError {
    if e.is_timeout() {
        EmbeddingError::Timeout {
            seconds: PROVIDER_TIMEOUT_SECS,
        }
    } else {
        EmbeddingError::Http {
            status: e.status().map(|s| s.as_u16()).unwrap_or(503),
            message: e.to_string(),
        }
    }
}

/// Turn a non-success response into the right error, honouring
/// `Retry-After` on 429.
pub(crate) async fn status_error(resp: reqwest::Response) -> EmbeddingError {
    let status = resp.status().as_u16();
    if status == 429 {
        let retry_after_ms = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1_000);
        return EmbeddingError::RateLimited { retry_after_ms };
    }
    let body = resp.text().await.unwrap_or_default();
    EmbeddingError::Http {
        status,
        message: body.chars().take(200).collect(),
    }
}
