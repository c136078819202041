use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized per-user classifier model as the metadata store sees it.
/// The classifier crate owns the live weight matrices; this is the
/// at-rest shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRecord {
    pub user_id: String,
    /// JSON object: sector name → weight vector.
    pub weights: serde_json::Value,
    /// JSON object: sector name → bias.
    pub biases: serde_json::Value,
    /// Input dimension the weights were trained at.
    pub dim: usize,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}
