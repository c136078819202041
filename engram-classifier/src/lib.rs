//! # engram-classifier
//!
//! Per-user sector classification: a linear model with softmax over the
//! five sectors, trained online by SGD from stored mean vectors, cached
//! LRU by user id.

pub mod cache;
pub mod model;
pub mod trainer;

pub use cache::ClassifierCache;
pub use model::{LinearModel, Prediction};
pub use trainer::{train, TrainSample};
