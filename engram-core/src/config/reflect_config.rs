use serde::{Deserialize, Serialize};

use super::defaults;

/// Reflection & maintenance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectConfig {
    /// Minimum recent memories before reflection runs at all.
    pub reflect_min: usize,
    /// How many recent memories a reflection pass considers.
    pub window: usize,
    /// Token-cosine similarity for greedy clustering.
    pub cluster_similarity: f64,
    /// Scheduler cadence for reflection, minutes.
    pub interval_minutes: u64,
    /// Scheduler cadence for the decay sweep, minutes.
    pub decay_interval_minutes: u64,
    /// Start the scheduler on engine init.
    pub auto_reflect: bool,
    /// Waypoints below this weight are pruned.
    pub prune_threshold: f64,
}

impl Default for ReflectConfig {
    fn default() -> Self {
        Self {
            reflect_min: defaults::DEFAULT_REFLECT_MIN,
            window: defaults::DEFAULT_REFLECT_WINDOW,
            cluster_similarity: defaults::DEFAULT_CLUSTER_SIMILARITY,
            interval_minutes: defaults::DEFAULT_REFLECT_INTERVAL_MINUTES,
            decay_interval_minutes: defaults::DEFAULT_DECAY_INTERVAL_MINUTES,
            auto_reflect: false,
            prune_threshold: defaults::DEFAULT_PRUNE_THRESHOLD,
        }
    }
}
