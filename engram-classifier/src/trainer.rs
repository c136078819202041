//! Online SGD training with cross-entropy loss.

use std::collections::HashMap;

use engram_core::constants::TRAIN_YIELD_EVERY;
use engram_core::errors::ClassifierError;
use engram_core::sector::Sector;
use rand::rngs::OsRng;
use rand::Rng;
use tracing::debug;

use crate::model::LinearModel;

/// One labelled training example.
#[derive(Debug, Clone)]
pub struct TrainSample {
    pub vector: Vec<f32>,
    pub label: Sector,
}

/// Scale for fresh sector weights.
const INIT_SCALE: f32 = 0.01;

/// Train (or continue training) a model.
///
/// - Empty data returns the prior unchanged, or fails when there is none.
/// - A prior whose dimension differs from the data resets the model:
///   weights and the learned sector set are cleared, not carried over.
/// - Sectors first seen in this batch get small random weights drawn
///   from the OS RNG.
/// - Yields to the runtime every 100 samples so a big batch cannot
///   starve other tasks.
pub async fn train(
    data: &[TrainSample],
    prior: Option<LinearModel>,
    lr: f64,
    epochs: usize,
) -> Result<LinearModel, ClassifierError> {
    if data.is_empty() {
        return prior.ok_or(ClassifierError::EmptyTrainingSet);
    }

    let dim = data[0].vector.len();
    for sample in data {
        if sample.vector.len() != dim {
            return Err(ClassifierError::DimensionMismatch {
                expected: dim,
                actual: sample.vector.len(),
            });
        }
    }

    let mut model = match prior {
        Some(m) if m.dim == dim => m,
        Some(m) => {
            debug!(
                old_dim = m.dim,
                new_dim = dim,
                "dimension changed, resetting classifier"
            );
            LinearModel::empty(dim)
        }
        None => LinearModel::empty(dim),
    };

    // Register sectors this batch introduces.
    let mut rng = OsRng;
    for sample in data {
        model.weights.entry(sample.label).or_insert_with(|| {
            (0..dim)
                .map(|_| rng.gen_range(-INIT_SCALE..INIT_SCALE))
                .collect()
        });
        model.biases.entry(sample.label).or_insert(0.0);
    }

    let sectors: Vec<Sector> = model.weights.keys().copied().collect();
    let mut processed = 0usize;

    for _epoch in 0..epochs {
        for sample in data {
            sgd_step(&mut model, &sectors, sample, lr);
            processed += 1;
            if processed % TRAIN_YIELD_EVERY == 0 {
                tokio::task::yield_now().await;
            }
        }
    }

    model.version += 1;
    Ok(model)
}

/// One gradient step: softmax over the known sectors, then
/// `w ← w − lr·(p − y)·x` per sector.
fn sgd_step(model: &mut LinearModel, sectors: &[Sector], sample: &TrainSample, lr: f64) {
    // Forward pass.
    let mut scores: HashMap<Sector, f64> = HashMap::with_capacity(sectors.len());
    for &s in sectors {
        let w = &model.weights[&s];
        let dot: f64 = w
            .iter()
            .zip(sample.vector.iter())
            .map(|(a, b)| (*a as f64) * (*b as f64))
            .sum();
        scores.insert(s, model.biases.get(&s).copied().unwrap_or(0.0) + dot);
    }

    let max = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in scores.values_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in scores.values_mut() {
        *v /= sum;
    }

    // Backward pass.
    for &s in sectors {
        let p = scores[&s];
        let y = if s == sample.label { 1.0 } else { 0.0 };
        let grad = p - y;
        let w = model.weights.get_mut(&s).unwrap();
        for (wi, xi) in w.iter_mut().zip(sample.vector.iter()) {
            *wi -= (lr * grad * (*xi as f64)) as f32;
        }
        *model.biases.get_mut(&s).unwrap() -= lr * grad;
    }
}
