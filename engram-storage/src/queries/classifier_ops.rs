//! Per-user classifier model persistence.

use engram_core::errors::EngramResult;
use engram_core::models::ClassifierRecord;

use crate::params;
use crate::sql::{to_millis, SqlExecutor};

pub async fn upsert_model(exec: &dyn SqlExecutor, record: &ClassifierRecord) -> EngramResult<()> {
    exec.run(
        "INSERT INTO classifier_models (user_id, weights, biases, dim, version, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT (user_id) DO UPDATE SET
            weights = excluded.weights,
            biases = excluded.biases,
            dim = excluded.dim,
            version = excluded.version,
            updated_at = excluded.updated_at",
        &params![
            record.user_id.as_str(),
            record.weights.clone(),
            record.biases.clone(),
            record.dim,
            record.version,
            to_millis(record.updated_at),
        ],
    )
    .await?;
    Ok(())
}

pub async fn get_model(
    exec: &dyn SqlExecutor,
    user_id: &str,
) -> EngramResult<Option<ClassifierRecord>> {
    let row = exec
        .get(
            "SELECT user_id, weights, biases, dim, version, updated_at
             FROM classifier_models WHERE user_id = ?",
            &params![user_id],
        )
        .await?;

    row.map(|r| {
        Ok(ClassifierRecord {
            user_id: r.str("user_id")?,
            weights: r.json("weights")?,
            biases: r.json("biases")?,
            dim: r.i64("dim")? as usize,
            version: r.i64("version")?,
            updated_at: r.millis("updated_at")?,
        })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaStore;
    use chrono::Utc;

    #[tokio::test]
    async fn upsert_and_get() {
        let store = MetaStore::open_in_memory().await.unwrap();
        let mut record = ClassifierRecord {
            user_id: "alice".into(),
            weights: serde_json::json!({"semantic": [0.1, 0.2]}),
            biases: serde_json::json!({"semantic": 0.0}),
            dim: 2,
            version: 1,
            updated_at: Utc::now(),
        };
        upsert_model(&store, &record).await.unwrap();

        record.version = 2;
        upsert_model(&store, &record).await.unwrap();

        let got = get_model(&store, "alice").await.unwrap().unwrap();
        assert_eq!(got.version, 2);
        assert_eq!(got.dim, 2);
        assert_eq!(got.weights["semantic"][1], 0.2);

        assert!(get_model(&store, "bob").await.unwrap().is_none());
    }
}
