use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bitemporal (subject, predicate, object) assertion.
///
/// Writes never mutate an existing row's validity except to close an open
/// window; superseding facts are new rows with overlapping validity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalFact {
    pub id: String,
    pub user_id: Option<String>,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub valid_from: DateTime<Utc>,
    /// `None` while the fact is still current.
    pub valid_to: Option<DateTime<Utc>>,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TemporalFact {
    pub fn new(
        user_id: Option<String>,
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
        confidence: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            valid_from: now,
            valid_to: None,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: serde_json::Value::Object(Default::default()),
            created_at: now,
        }
    }

    /// Whether the fact is valid at the given instant.
    pub fn valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_to.map_or(true, |to| at < to)
    }
}

/// A typed relation between two facts with its own validity window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalEdge {
    pub id: String,
    pub src_fact_id: String,
    pub dst_fact_id: String,
    pub relation: String,
    pub weight: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}
