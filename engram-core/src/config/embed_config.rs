use serde::{Deserialize, Serialize};

use super::defaults;

/// Which embedding path produces the persisted vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Synthetic only — no provider calls.
    Fast,
    /// Provider only.
    Standard,
    /// Synthetic fused with a compressed provider vector.
    Smart,
    /// Same fusion as smart; kept distinct so operators can tune them
    /// apart later.
    Hybrid,
}

impl Tier {
    pub fn fuses(self) -> bool {
        matches!(self, Tier::Smart | Tier::Hybrid)
    }
}

/// Provider family selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbedKind {
    Synthetic,
    OpenaiLike,
    GeminiLike,
    OllamaLike,
    Local,
}

/// Per-sector request fan-out strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMode {
    /// One native batch request per call.
    Simple,
    /// One request per sector, optionally parallel.
    Advanced,
}

/// Embedding subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub tier: Tier,
    pub kind: EmbedKind,
    pub mode: EmbedMode,
    /// Allow parallel per-sector requests in advanced mode. Ignored for
    /// providers with strict per-key rate limits.
    pub advanced_parallel: bool,
    /// Inter-sector delay in advanced mode, milliseconds.
    pub delay_ms: u64,
    /// Toggle the fuse step at tier smart/hybrid.
    pub hybrid_fusion: bool,
    /// Provider endpoint, when a remote kind is selected.
    pub base_url: Option<String>,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            tier: Tier::Fast,
            kind: EmbedKind::Synthetic,
            mode: EmbedMode::Simple,
            advanced_parallel: false,
            delay_ms: defaults::DEFAULT_EMBED_DELAY_MS,
            hybrid_fusion: true,
            base_url: None,
            model: defaults::DEFAULT_EMBED_MODEL.to_string(),
            api_key: None,
        }
    }
}
