use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sector::Sector;

/// Per-sector aggregate used by the stats view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorStats {
    pub sector: Sector,
    pub count: u64,
    pub mean_salience: f64,
}

/// One maintenance run (decay sweep, reflection, waypoint prune).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsLogEntry {
    pub id: String,
    pub op: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Rows touched by the run.
    pub affected: i64,
    pub detail: Option<String>,
}

impl OpsLogEntry {
    pub fn started(op: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            op: op.into(),
            started_at: Utc::now(),
            finished_at: None,
            affected: 0,
            detail: None,
        }
    }
}
