//! Error types for ceteris paribus profiling

use thiserror::Error;

/// Result type alias for profiling operations
pub type Result<T> = std::result::Result<T, CeterisError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum CeterisError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Data error: {0}")]
    DataError(String),

    /// Raised by predictors; the builder returns it untouched.
    #[error("Prediction error: {0}")]
    PredictionError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for CeterisError {
    fn from(err: polars::error::PolarsError) -> Self {
        CeterisError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CeterisError {
    fn from(err: serde_json::Error) -> Self {
        CeterisError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CeterisError {
    fn from(err: ndarray::ShapeError) -> Self {
        CeterisError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CeterisError::FeatureNotFound("nonexistent".to_string());
        assert_eq!(err.to_string(), "Feature not found: nonexistent");

        let err = CeterisError::ShapeError {
            expected: "20 predictions".to_string(),
            actual: "19".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid shape: expected 20 predictions, got 19");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config missing");
        let err: CeterisError = io_err.into();
        assert!(matches!(err, CeterisError::IoError(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CeterisError = json_err.into();
        assert!(matches!(err, CeterisError::SerializationError(_)));
    }
}
