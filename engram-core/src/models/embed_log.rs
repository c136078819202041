use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Embedding batch lifecycle. Terminal states are absorbing; a retried
/// ingestion writes a new row with a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedLogStatus {
    Pending,
    Completed,
    Failed,
}

impl EmbedLogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EmbedLogStatus::Pending => "pending",
            EmbedLogStatus::Completed => "completed",
            EmbedLogStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(EmbedLogStatus::Pending),
            "completed" => Some(EmbedLogStatus::Completed),
            "failed" => Some(EmbedLogStatus::Failed),
            _ => None,
        }
    }
}

/// One row per embedding batch, written pending at the start and updated
/// exactly once on completion or terminal failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedLog {
    pub id: String,
    /// The memory the batch was embedding, when known.
    pub memory_id: Option<String>,
    pub status: EmbedLogStatus,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl EmbedLog {
    pub fn pending(memory_id: Option<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            memory_id,
            status: EmbedLogStatus::Pending,
            model: model.into(),
            created_at: now,
            updated_at: now,
            error: None,
        }
    }
}
