//! Shared test builders for the integration suite.

use engram::{Engram, EngramConfig, SecurityContext};

/// A deterministic in-memory engine: synthetic embeddings at a small
/// dimension, embedded metadata store, SQL vector backend, scheduler
/// off.
pub async fn test_engine() -> Engram {
    Engram::open(test_config()).await.expect("test engine")
}

pub fn test_config() -> EngramConfig {
    let mut config = EngramConfig::default();
    config.vec_dim = engram::config::VecDim(64);
    config.reflect.auto_reflect = false;
    config
}

pub fn alice() -> SecurityContext {
    SecurityContext::for_user("alice")
}

pub fn bob() -> SecurityContext {
    SecurityContext::for_user("bob")
}

pub fn admin() -> SecurityContext {
    SecurityContext::admin()
}

/// Route tracing into test output. Honours `RUST_LOG`; repeated calls
/// are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
