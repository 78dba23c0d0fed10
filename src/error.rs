//! Error types for learnkit.

use ndarray::ShapeError;
use thiserror::Error;

/// Result type alias for learnkit operations.
pub type Result<T> = std::result::Result<T, LearnError>;

/// Errors that can occur in learnkit operations.
#[derive(Error, Debug)]
pub enum LearnError {
    /// Invalid parameter value (metric parameters, estimator settings).
    #[error("{0}")]
    InvalidParameter(String),
    /// Invalid input data.
    #[error("{0}")]
    InvalidInput(String),
    /// Shape mismatch in arrays.
    #[error("Shape mismatch: expected {expected_shape}, got {actual_shape}")]
    ShapeMismatch {
        expected_shape: String,
        actual_shape: String,
    },
    /// The estimator has not been fitted yet.
    #[error(
        "This {0} instance is not fitted yet. Call 'fit' with appropriate arguments before using this estimator."
    )]
    NotFitted(String),
    /// A serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A numerical linear algebra failure (singular or indefinite matrix).
    #[error("Linear algebra error: {0}")]
    LinAlg(String),
    /// The worker pool could not be built.
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl From<ShapeError> for LearnError {
    fn from(err: ShapeError) -> Self {
        LearnError::ShapeMismatch {
            expected_shape: "unknown".to_string(),
            actual_shape: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for LearnError {
    fn from(err: serde_json::Error) -> Self {
        LearnError::Serialization(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for LearnError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        LearnError::ThreadPool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LearnError::InvalidParameter("w contains NaN".to_string());
        assert_eq!(err.to_string(), "w contains NaN");

        let err = LearnError::NotFitted("SimpleImputer".to_string());
        assert!(err.to_string().starts_with("This SimpleImputer instance is not fitted yet"));

        let err = LearnError::ShapeMismatch {
            expected_shape: "(4, 2)".to_string(),
            actual_shape: "(3, 2)".to_string(),
        };
        assert_eq!(err.to_string(), "Shape mismatch: expected (4, 2), got (3, 2)");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<LearnError>();
        assert_sync::<LearnError>();
    }

    #[test]
    fn test_from_serde_json() {
        let parse: std::result::Result<f64, _> = serde_json::from_str("not json");
        let err: LearnError = parse.unwrap_err().into();
        assert!(matches!(err, LearnError::Serialization(_)));
    }
}
