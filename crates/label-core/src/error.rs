use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LabelError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid label {label} at index {index} (expected a class in 0..{num_classes})")]
    InvalidLabel {
        index: usize,
        label: usize,
        num_classes: usize,
    },

    #[error("Invalid probability row {row}: {reason}")]
    InvalidProbability { row: usize, reason: String },

    #[error("Need at least 2 classes, got {0}")]
    TooFewClasses(usize),

    #[error("Invalid sample weights: {0}")]
    InvalidWeights(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Classifier error: {0}")]
    Classifier(String),
}

pub type LabelResult<T> = Result<T, LabelError>;
