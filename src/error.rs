//! Error types for the chainfill imputation engine

use thiserror::Error;

/// Result type alias for chainfill operations
pub type Result<T> = std::result::Result<T, MiceError>;

/// Main error type for the chainfill crate
#[derive(Error, Debug)]
pub enum MiceError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionError { expected: String, actual: String },

    #[error("State error: {0}")]
    StateError(String),

    #[error("Input error: {0}")]
    InputError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ndarray::ShapeError> for MiceError {
    fn from(err: ndarray::ShapeError) -> Self {
        MiceError::DimensionError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MiceError {
    fn from(err: serde_json::Error) -> Self {
        MiceError::SerializationError(err.to_string())
    }
}
