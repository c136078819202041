use super::EngramError;

/// Errors raised by the per-user sector classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("training data is empty and no prior model exists")]
    EmptyTrainingSet,

    #[error("dimension mismatch: model has {expected}, input has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("no model stored for user")]
    NoModel,
}

impl From<ClassifierError> for EngramError {
    fn from(e: ClassifierError) -> Self {
        EngramError::BadRequest {
            message: e.to_string(),
        }
    }
}
