use serde::{Deserialize, Serialize};

use super::memory::MemoryRecord;

/// A retrieval hit: the memory plus the scores that put it in the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
    pub memory: MemoryRecord,
    /// Combined score: resonance-weighted similarity × salience, plus the
    /// spread contribution.
    pub score: f64,
    /// Energy this memory accumulated during spreading activation.
    pub activation_energy: f64,
}
