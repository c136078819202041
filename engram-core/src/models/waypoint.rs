use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A directed weighted edge between two memories.
///
/// Keyed by (src, dst, user). Invariants: `src_id != dst_id`, weight in
/// (0, 1]. Edges below the prune threshold are removed by maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub src_id: String,
    pub dst_id: String,
    pub user_id: Option<String>,
    pub weight: f64,
    /// Times this edge fired together during recall.
    pub coactivations: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Waypoint {
    pub fn new(
        src_id: impl Into<String>,
        dst_id: impl Into<String>,
        user_id: Option<String>,
        weight: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            src_id: src_id.into(),
            dst_id: dst_id.into(),
            user_id,
            weight,
            coactivations: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
