use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sector::Sector;

/// A stored memory row. Every memory in the system is one of these,
/// regardless of which sector(s) it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v4 identifier.
    pub id: String,
    /// Owning tenant. `None` for anonymous rows (reflections that span
    /// users are the only writer of those).
    pub user_id: Option<String>,
    /// Free-form textual content.
    pub content: String,
    /// The sector the classifier picked as primary.
    pub primary_sector: Sector,
    /// Additional sectors this memory also belongs to.
    pub sectors: Vec<Sector>,
    /// Free-form tags, stored as a JSON array of strings.
    pub tags: Vec<String>,
    /// Opaque key/value metadata, stored as a JSON object.
    pub metadata: serde_json::Value,
    /// Retrieval priority in [0, 1]. Decays with time, reinforced by
    /// recall.
    pub salience: f64,
    /// Per-memory decay coefficient, λ > 0.
    pub decay_lambda: f64,
    /// Version counter, incremented on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last recall or reinforcement; the decay clock measures from here.
    pub last_seen_at: DateTime<Utc>,
    /// Coarse shard id.
    pub segment: i64,
    /// 64-bit similarity-preserving fingerprint for near-duplicate
    /// detection. Encoded lowercase hex at the storage boundary.
    pub simhash: u64,
    /// Mean embedding over the primary-sector chunk vectors.
    pub mean_vec: Option<Vec<f32>>,
    /// Invariant: equals `mean_vec.len()` whenever `mean_vec` is set.
    pub mean_dim: Option<usize>,
    /// Cumulative explicit feedback in [-1, 1].
    pub feedback_score: f64,
    /// Set once a reflection has summarised this memory.
    pub consolidated: bool,
    /// Synthesised summary, present on reflective rows.
    pub generated_summary: Option<String>,
}

impl MemoryRecord {
    /// Build a fresh record with ingestion defaults. The pipeline fills
    /// sectors, simhash, and the mean vector before persisting.
    pub fn new(content: impl Into<String>, user_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            content: content.into(),
            primary_sector: Sector::Semantic,
            sectors: Vec::new(),
            tags: Vec::new(),
            metadata: serde_json::Value::Object(Default::default()),
            salience: 0.5,
            decay_lambda: 0.01,
            version: 1,
            created_at: now,
            updated_at: now,
            last_seen_at: now,
            segment: 0,
            simhash: 0,
            mean_vec: None,
            mean_dim: None,
            feedback_score: 0.0,
            consolidated: false,
            generated_summary: None,
        }
    }

    /// Days elapsed since the memory was last seen, measured at `now`.
    pub fn days_since_seen(&self, now: DateTime<Utc>) -> f64 {
        let ms = now
            .signed_duration_since(self.last_seen_at)
            .num_milliseconds()
            .max(0);
        ms as f64 / 86_400_000.0
    }
}

impl PartialEq for MemoryRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// What `add_memory` hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMemoryResult {
    pub id: String,
    pub primary_sector: Sector,
    pub sectors: Vec<Sector>,
    /// True when the text matched an existing row by simhash and no new
    /// row was written.
    pub deduplicated: bool,
}
