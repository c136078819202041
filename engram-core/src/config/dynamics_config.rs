use serde::{Deserialize, Serialize};

use super::defaults;

/// Salience dynamics coefficients. Every constant here matches one term
/// in the decay/reinforcement equations and can be overridden.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    /// Recall contribution to salience.
    pub alpha_recall: f64,
    /// Emotional contribution to salience.
    pub beta_emotion: f64,
    /// Per-hop attenuation during spreading activation.
    pub gamma_attenuation: f64,
    /// Slow-phase scale in dual-phase retention.
    pub theta_consolidation: f64,
    /// Reinforcement step size.
    pub eta_reinforcement: f64,
    /// Fast decay constant (per day).
    pub lambda_fast: f64,
    /// Slow decay constant (per day).
    pub lambda_slow: f64,
    /// Base energy threshold for retrieval cutting.
    pub tau_energy: f64,
    /// λ assigned to new memories.
    pub default_lambda: f64,
    /// Cosine similarity above which ingestion links neighbours.
    pub link_threshold: f64,
    /// Max waypoints appended per ingested memory.
    pub max_links_per_add: usize,
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            alpha_recall: defaults::DEFAULT_ALPHA_RECALL,
            beta_emotion: defaults::DEFAULT_BETA_EMOTION,
            gamma_attenuation: defaults::DEFAULT_GAMMA_ATTENUATION,
            theta_consolidation: defaults::DEFAULT_THETA_CONSOLIDATION,
            eta_reinforcement: defaults::DEFAULT_ETA_REINFORCEMENT,
            lambda_fast: defaults::DEFAULT_LAMBDA_FAST,
            lambda_slow: defaults::DEFAULT_LAMBDA_SLOW,
            tau_energy: defaults::DEFAULT_TAU_ENERGY,
            default_lambda: defaults::DEFAULT_DECAY_LAMBDA,
            link_threshold: defaults::DEFAULT_LINK_THRESHOLD,
            max_links_per_add: defaults::DEFAULT_MAX_LINKS_PER_ADD,
        }
    }
}
