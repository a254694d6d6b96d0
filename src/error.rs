//! Error types for the mixnas crate

use thiserror::Error;

/// Result type alias for mixnas operations
pub type Result<T> = std::result::Result<T, MixNasError>;

/// Main error type for the mixnas crate
///
/// Construction-time errors (configuration conflicts, unknown primitives,
/// parameter-ordering bugs) are unrecoverable at this level and are meant
/// to propagate to the model-construction layer.
#[derive(Error, Debug)]
pub enum MixNasError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown primitive: {0}")]
    UnknownPrimitive(String),

    #[error("Architecture weights must be allocated before any operation parameters exist")]
    ParameterOrderViolation,

    #[error("Catalog index out of range: {index} >= {len}")]
    CatalogIndexOutOfRange { index: usize, len: usize },

    #[error("Diversity-eligible index out of range: {index} >= {len}")]
    ValidIndexOutOfRange { index: usize, len: usize },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ndarray::ShapeError> for MixNasError {
    fn from(err: ndarray::ShapeError) -> Self {
        MixNasError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MixNasError {
    fn from(err: serde_json::Error) -> Self {
        MixNasError::SerializationError(err.to_string())
    }
}
