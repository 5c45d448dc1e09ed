//! Error types for the pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Column '{column}' is not numeric (dtype {dtype})")]
    NonNumericColumn { column: String, dtype: String },

    #[error("Column '{0}' has zero variance and cannot be standardized")]
    ZeroVariance(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Fit failed for candidate {candidate} on fold {fold}: {reason}")]
    FitFailed {
        candidate: usize,
        fold: usize,
        reason: String,
    },

    #[error("Scoring error: {0}")]
    ScoringError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl PipelineError {
    /// Shorthand for an `InvalidParameter` error
    pub fn invalid_param(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
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
        let err = PipelineError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipelineError = io_err.into();
        assert!(matches!(err, PipelineError::IoError(_)));
    }

    #[test]
    fn test_invalid_param_display() {
        let err = PipelineError::invalid_param("test_size", 1.5, "must be in (0, 1)");
        assert_eq!(
            err.to_string(),
            "Invalid parameter: test_size = 1.5, must be in (0, 1)"
        );
    }

    #[test]
    fn test_fit_failed_display() {
        let err = PipelineError::FitFailed {
            candidate: 2,
            fold: 1,
            reason: "boom".to_string(),
        };
        assert!(err.to_string().contains("candidate 2"));
    }
}
