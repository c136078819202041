//! Default values shared by the config structs.

pub const DEFAULT_VEC_DIM: usize = 256;

// Dynamics coefficients.
pub const DEFAULT_ALPHA_RECALL: f64 = 0.15;
pub const DEFAULT_BETA_EMOTION: f64 = 0.20;
pub const DEFAULT_GAMMA_ATTENUATION: f64 = 0.35;
pub const DEFAULT_THETA_CONSOLIDATION: f64 = 0.40;
pub const DEFAULT_ETA_REINFORCEMENT: f64 = 0.18;
pub const DEFAULT_LAMBDA_FAST: f64 = 0.015;
pub const DEFAULT_LAMBDA_SLOW: f64 = 0.002;
pub const DEFAULT_TAU_ENERGY: f64 = 0.40;
pub const DEFAULT_DECAY_LAMBDA: f64 = 0.01;

// Ingestion linking.
pub const DEFAULT_LINK_THRESHOLD: f64 = 0.55;
pub const DEFAULT_MAX_LINKS_PER_ADD: usize = 5;

// Reflection & maintenance.
pub const DEFAULT_REFLECT_MIN: usize = 20;
pub const DEFAULT_REFLECT_INTERVAL_MINUTES: u64 = 60;
pub const DEFAULT_DECAY_INTERVAL_MINUTES: u64 = 360;
pub const DEFAULT_PRUNE_THRESHOLD: f64 = 0.01;
pub const DEFAULT_REFLECT_WINDOW: usize = 100;
pub const DEFAULT_CLUSTER_SIMILARITY: f64 = 0.8;

// Embedding orchestrator.
pub const DEFAULT_EMBED_MODEL: &str = "synthetic-v1";
pub const DEFAULT_EMBED_DELAY_MS: u64 = 0;

// Storage.
pub const DEFAULT_POOL_SIZE: u32 = 4;
