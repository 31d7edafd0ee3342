use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

/// Malformed benchmark records. Raised per record, never for a whole suite.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Invalid record at index {index}: {message}")]
    InvalidRecord { index: usize, message: String },

    #[error("Unknown value for {field}: {value}")]
    UnknownValue { field: String, value: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Vector store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Failures raised by an injected Scanner, Analyzer or MarkerDetector.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} failed: {message}")]
    Failed {
        collaborator: String,
        message: String,
    },

    #[error("{collaborator} returned invalid output: {message}")]
    InvalidOutput {
        collaborator: String,
        message: String,
    },
}

impl CollaboratorError {
    /// Shorthand for a plain failure.
    pub fn failed(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        CollaboratorError::Failed {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

/// Evaluator construction errors
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("Missing collaborator: {name} must be supplied before evaluation")]
    MissingCollaborator { name: String },

    #[error("Invalid evaluation config: {message}")]
    InvalidConfig { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for data validation
pub type DataResult<T> = Result<T, DataError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for collaborator calls
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "benchmark file not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Configuration error: benchmark file not found"
        );

        let err = AppError::Io {
            path: "suite.json".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(err.to_string(), "I/O error on suite.json: permission denied");
    }

    #[test]
    fn test_data_error_display() {
        let err = DataError::InvalidRecord {
            index: 3,
            message: "not an object".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid record at index 3: not an object");

        let err = DataError::UnknownValue {
            field: "expected_risk_level".to_string(),
            value: "panic".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown value for expected_risk_level: panic");

        let err = DataError::MissingField {
            field: "case_id".to_string(),
        };
        assert_eq!(err.to_string(), "Missing required field: case_id");
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::DimensionMismatch {
            expected: 384,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "Embedding dimension mismatch: expected 384, got 3"
        );
    }

    #[test]
    fn test_collaborator_error_display() {
        let err = CollaboratorError::failed("scanner", "model not loaded");
        assert_eq!(err.to_string(), "scanner failed: model not loaded");

        let err = CollaboratorError::InvalidOutput {
            collaborator: "analyzer".to_string(),
            message: "risk score NaN".to_string(),
        };
        assert_eq!(err.to_string(), "analyzer returned invalid output: risk score NaN");
    }

    #[test]
    fn test_evaluation_error_display() {
        let err = EvaluationError::MissingCollaborator {
            name: "scanner".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing collaborator: scanner must be supplied before evaluation"
        );
    }

    #[test]
    fn test_conversions_to_app_error() {
        let app_err: AppError = StoreError::DimensionMismatch {
            expected: 8,
            actual: 4,
        }
        .into();
        assert!(matches!(app_err, AppError::Store(_)));

        let app_err: AppError = CollaboratorError::failed("scanner", "boom").into();
        assert!(matches!(app_err, AppError::Collaborator(_)));

        let app_err: AppError = EvaluationError::InvalidConfig {
            message: "concurrency".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Evaluation(_)));

        let app_err: AppError = DataError::MissingField {
            field: "input_text".to_string(),
        }
        .into();
        assert!(matches!(app_err, AppError::Data(_)));
    }
}
