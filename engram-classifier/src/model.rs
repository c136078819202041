//! The linear softmax model and its at-rest serialization.

use std::collections::HashMap;

use chrono::Utc;
use engram_core::errors::ClassifierError;
use engram_core::models::ClassifierRecord;
use engram_core::sector::Sector;

/// Additional sectors must clear both an absolute and a relative bar.
const ADDITIONAL_MIN_PROB: f64 = 0.10;
const ADDITIONAL_RELATIVE: f64 = 0.4;
const ADDITIONAL_MAX: usize = 5;

/// A prediction: the winning sector, runners-up that cleared the bar,
/// and the winner's softmax probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub primary: Sector,
    pub additional: Vec<Sector>,
    pub confidence: f64,
}

impl Prediction {
    /// The fallback when a user has no trained model yet.
    pub fn default_semantic() -> Self {
        Self {
            primary: Sector::Semantic,
            additional: Vec::new(),
            confidence: 0.2,
        }
    }
}

/// Per-user linear model: one weight vector and bias per known sector.
/// Sectors the user has never labelled are simply absent.
#[derive(Debug, Clone)]
pub struct LinearModel {
    pub dim: usize,
    pub weights: HashMap<Sector, Vec<f32>>,
    pub biases: HashMap<Sector, f64>,
    pub version: i64,
}

impl LinearModel {
    pub fn empty(dim: usize) -> Self {
        Self {
            dim,
            weights: HashMap::new(),
            biases: HashMap::new(),
            version: 0,
        }
    }

    /// Score the input against every known sector, softmax, and apply
    /// the primary/additional rules. Errors on a dimension mismatch;
    /// returns the semantic default when no sector has weights yet.
    pub fn predict(&self, v: &[f32]) -> Result<Prediction, ClassifierError> {
        if self.weights.is_empty() {
            return Ok(Prediction::default_semantic());
        }
        if v.len() != self.dim {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dim,
                actual: v.len(),
            });
        }

        let mut scored: Vec<(Sector, f64)> = self
            .weights
            .iter()
            .map(|(&sector, w)| {
                let dot: f64 = w.iter().zip(v.iter()).map(|(a, b)| (*a as f64) * (*b as f64)).sum();
                let bias = self.biases.get(&sector).copied().unwrap_or(0.0);
                (sector, bias + dot)
            })
            .collect();

        softmax_in_place(&mut scored);
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let (primary, confidence) = scored[0];
        let additional: Vec<Sector> = scored[1..]
            .iter()
            .filter(|(_, p)| *p >= ADDITIONAL_MIN_PROB && *p >= ADDITIONAL_RELATIVE * confidence)
            .take(ADDITIONAL_MAX)
            .map(|(s, _)| *s)
            .collect();

        Ok(Prediction {
            primary,
            additional,
            confidence,
        })
    }

    /// Serialize for the metadata store.
    pub fn to_record(&self, user_id: &str) -> ClassifierRecord {
        let weights = serde_json::Value::Object(
            self.weights
                .iter()
                .map(|(s, w)| {
                    (
                        s.as_str().to_string(),
                        serde_json::to_value(w).unwrap_or_default(),
                    )
                })
                .collect(),
        );
        let biases = serde_json::Value::Object(
            self.biases
                .iter()
                .map(|(s, b)| {
                    (
                        s.as_str().to_string(),
                        serde_json::Value::from(*b),
                    )
                })
                .collect(),
        );
        ClassifierRecord {
            user_id: user_id.to_string(),
            weights,
            biases,
            dim: self.dim,
            version: self.version,
            updated_at: Utc::now(),
        }
    }

    /// Rehydrate from the metadata store. Unknown sector names and
    /// malformed entries are dropped rather than failing the load.
    pub fn from_record(record: &ClassifierRecord) -> Self {
        let mut weights = HashMap::new();
        let mut biases = HashMap::new();

        if let Some(obj) = record.weights.as_object() {
            for (name, value) in obj {
                let Some(sector) = Sector::parse(name) else {
                    continue;
                };
                if let Ok(w) = serde_json::from_value::<Vec<f32>>(value.clone()) {
                    if w.len() == record.dim {
                        weights.insert(sector, w);
                    }
                }
            }
        }
        if let Some(obj) = record.biases.as_object() {
            for (name, value) in obj {
                if let (Some(sector), Some(b)) = (Sector::parse(name), value.as_f64()) {
                    biases.insert(sector, b);
                }
            }
        }

        Self {
            dim: record.dim,
            weights,
            biases,
            version: record.version,
        }
    }
}

/// Numerically stable softmax over (sector, score) pairs.
fn softmax_in_place(scored: &mut [(Sector, f64)]) {
    let max = scored
        .iter()
        .map(|(_, s)| *s)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for (_, s) in scored.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    if sum > 0.0 {
        for (_, s) in scored.iter_mut() {
            *s /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(dim: usize, at: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[at] = 1.0;
        v
    }

    #[test]
    fn empty_model_defaults_to_semantic() {
        let model = LinearModel::empty(8);
        let p = model.predict(&one_hot(8, 0)).unwrap();
        assert_eq!(p.primary, Sector::Semantic);
        assert!(p.confidence < 0.5);
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let mut model = LinearModel::empty(8);
        model.weights.insert(Sector::Episodic, vec![0.0; 8]);
        assert!(matches!(
            model.predict(&one_hot(4, 0)),
            Err(ClassifierError::DimensionMismatch { expected: 8, actual: 4 })
        ));
    }

    #[test]
    fn strong_weights_win() {
        let mut model = LinearModel::empty(4);
        model.weights.insert(Sector::Episodic, vec![5.0, 0.0, 0.0, 0.0]);
        model.weights.insert(Sector::Emotional, vec![0.0, 5.0, 0.0, 0.0]);
        let p = model.predict(&one_hot(4, 1)).unwrap();
        assert_eq!(p.primary, Sector::Emotional);
        assert!(p.confidence > 0.9);
    }

    #[test]
    fn additional_sectors_respect_both_bars() {
        let mut model = LinearModel::empty(2);
        // Near-tied pair plus one clear loser.
        model.weights.insert(Sector::Episodic, vec![2.0, 0.0]);
        model.weights.insert(Sector::Procedural, vec![1.8, 0.0]);
        model.weights.insert(Sector::Reflective, vec![-5.0, 0.0]);
        let p = model.predict(&[1.0, 0.0]).unwrap();
        assert_eq!(p.primary, Sector::Episodic);
        assert_eq!(p.additional, vec![Sector::Procedural]);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut scored = vec![
            (Sector::Episodic, 1000.0),
            (Sector::Semantic, 999.0),
            (Sector::Procedural, 998.0),
        ];
        softmax_in_place(&mut scored);
        let sum: f64 = scored.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn record_roundtrip() {
        let mut model = LinearModel::empty(3);
        model.weights.insert(Sector::Emotional, vec![0.1, 0.2, 0.3]);
        model.biases.insert(Sector::Emotional, -0.5);
        model.version = 7;

        let record = model.to_record("alice");
        let back = LinearModel::from_record(&record);
        assert_eq!(back.dim, 3);
        assert_eq!(back.version, 7);
        assert_eq!(back.weights[&Sector::Emotional], vec![0.1, 0.2, 0.3]);
        assert_eq!(back.biases[&Sector::Emotional], -0.5);
    }

    #[test]
    fn from_record_drops_mismatched_rows() {
        let record = ClassifierRecord {
            user_id: "u".into(),
            weights: serde_json::json!({
                "emotional": [0.1, 0.2],
                "bogus_sector": [0.3, 0.4],
                "semantic": [0.1],
            }),
            biases: serde_json::json!({ "emotional": 0.0 }),
            dim: 2,
            version: 1,
            updated_at: Utc::now(),
        };
        let model = LinearModel::from_record(&record);
        assert_eq!(model.weights.len(), 1);
        assert!(model.weights.contains_key(&Sector::Emotional));
    }
}
