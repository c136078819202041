//! Configuration: one root struct, one file per subsystem, env overlay.

pub mod defaults;

mod dynamics_config;
mod embed_config;
mod reflect_config;
mod storage_config;

pub use dynamics_config::DynamicsConfig;
pub use embed_config::{EmbedConfig, EmbedKind, EmbedMode, Tier};
pub use reflect_config::ReflectConfig;
pub use storage_config::{MetadataBackend, StorageConfig, VectorBackend};

use serde::{Deserialize, Serialize};

use crate::errors::{EngramError, EngramResult};

/// Root configuration for an engram engine instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngramConfig {
    /// Target dimension for every persisted vector.
    #[serde(rename = "vec_dim")]
    pub vec_dim: VecDim,
    pub embed: EmbedConfig,
    pub dynamics: DynamicsConfig,
    pub reflect: ReflectConfig,
    pub storage: StorageConfig,
}

/// Newtype so the default (256) survives `#[serde(default)]` on the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VecDim(pub usize);

impl Default for VecDim {
    fn default() -> Self {
        VecDim(defaults::DEFAULT_VEC_DIM)
    }
}

impl EngramConfig {
    /// Parse a TOML config document.
    pub fn from_toml(text: &str) -> EngramResult<Self> {
        let cfg: EngramConfig = toml::from_str(text)
            .map_err(|e| EngramError::bad_request(format!("config parse: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a config from `ENGRAM_*` environment variables, starting from
    /// defaults. Unset variables keep their defaults; malformed values are
    /// a `BadRequest`.
    pub fn from_env() -> EngramResult<Self> {
        let mut cfg = EngramConfig::default();
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> EngramResult<()> {
        fn var(name: &str) -> Option<String> {
            std::env::var(name).ok().filter(|v| !v.is_empty())
        }
        fn parse<T: std::str::FromStr>(name: &str, raw: &str) -> EngramResult<T> {
            raw.parse().map_err(|_| {
                EngramError::bad_request(format!("invalid value for {name}: {raw}"))
            })
        }

        if let Some(v) = var("ENGRAM_TIER") {
            self.embed.tier = match v.as_str() {
                "fast" => Tier::Fast,
                "standard" => Tier::Standard,
                "smart" => Tier::Smart,
                "hybrid" => Tier::Hybrid,
                other => {
                    return Err(EngramError::bad_request(format!("unknown tier: {other}")))
                }
            };
        }
        if let Some(v) = var("ENGRAM_EMBED_KIND") {
            self.embed.kind = match v.as_str() {
                "synthetic" => EmbedKind::Synthetic,
                "openai-like" => EmbedKind::OpenaiLike,
                "gemini-like" => EmbedKind::GeminiLike,
                "ollama-like" => EmbedKind::OllamaLike,
                "local" => EmbedKind::Local,
                other => {
                    return Err(EngramError::bad_request(format!(
                        "unknown embed_kind: {other}"
                    )))
                }
            };
        }
        if let Some(v) = var("ENGRAM_VEC_DIM") {
            self.vec_dim = VecDim(parse("ENGRAM_VEC_DIM", &v)?);
        }
        if let Some(v) = var("ENGRAM_HYBRID_FUSION") {
            self.embed.hybrid_fusion = parse("ENGRAM_HYBRID_FUSION", &v)?;
        }
        if let Some(v) = var("ENGRAM_EMBED_MODE") {
            self.embed.mode = match v.as_str() {
                "simple" => EmbedMode::Simple,
                "advanced" => EmbedMode::Advanced,
                other => {
                    return Err(EngramError::bad_request(format!(
                        "unknown embed_mode: {other}"
                    )))
                }
            };
        }
        if let Some(v) = var("ENGRAM_ADV_EMBED_PARALLEL") {
            self.embed.advanced_parallel = parse("ENGRAM_ADV_EMBED_PARALLEL", &v)?;
        }
        if let Some(v) = var("ENGRAM_EMBED_DELAY_MS") {
            self.embed.delay_ms = parse("ENGRAM_EMBED_DELAY_MS", &v)?;
        }
        if let Some(v) = var("ENGRAM_EMBED_BASE_URL") {
            self.embed.base_url = Some(v);
        }
        if let Some(v) = var("ENGRAM_EMBED_API_KEY") {
            self.embed.api_key = Some(v);
        }
        if let Some(v) = var("ENGRAM_REFLECT_MIN") {
            self.reflect.reflect_min = parse("ENGRAM_REFLECT_MIN", &v)?;
        }
        if let Some(v) = var("ENGRAM_REFLECT_INTERVAL_MINUTES") {
            self.reflect.interval_minutes = parse("ENGRAM_REFLECT_INTERVAL_MINUTES", &v)?;
        }
        if let Some(v) = var("ENGRAM_AUTO_REFLECT") {
            self.reflect.auto_reflect = parse("ENGRAM_AUTO_REFLECT", &v)?;
        }
        if let Some(v) = var("ENGRAM_METADATA_BACKEND") {
            self.storage.metadata_backend = match v.as_str() {
                "embedded" => MetadataBackend::Embedded,
                "server" => MetadataBackend::Server,
                other => {
                    return Err(EngramError::bad_request(format!(
                        "unknown metadata_backend: {other}"
                    )))
                }
            };
        }
        if let Some(v) = var("ENGRAM_VECTOR_BACKEND") {
            self.storage.vector_backend = match v.as_str() {
                "sql" => VectorBackend::Sql,
                "kv_index" => VectorBackend::KvIndex,
                other => {
                    return Err(EngramError::bad_request(format!(
                        "unknown vector_backend: {other}"
                    )))
                }
            };
        }
        if let Some(v) = var("ENGRAM_STRICT_TENANT") {
            self.storage.strict_tenant = parse("ENGRAM_STRICT_TENANT", &v)?;
        }
        if let Some(v) = var("ENGRAM_DATA_PATH") {
            self.storage.path = Some(v.into());
        }
        if let Some(v) = var("ENGRAM_SERVER_DSN") {
            self.storage.server_dsn = Some(v);
        }
        Ok(())
    }

    fn validate(&self) -> EngramResult<()> {
        if self.vec_dim.0 == 0 {
            return Err(EngramError::bad_request("vec_dim must be positive"));
        }
        if self.dynamics.default_lambda <= 0.0 {
            return Err(EngramError::bad_request("default_lambda must be > 0"));
        }
        if self.storage.metadata_backend == MetadataBackend::Server
            && self.storage.server_dsn.is_none()
        {
            return Err(EngramError::bad_request(
                "server metadata backend requires a DSN",
            ));
        }
        Ok(())
    }
}
