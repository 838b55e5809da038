use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Errors raised while loading the classifier or serving a prediction.
#[derive(Error, Debug)]
pub enum PredictorError {
    /// Model artifact missing, unreadable or of an unsupported shape
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    /// Categorical value outside the recognized option set
    #[error("Invalid value '{value}' for {field}")]
    InvalidCategory { field: &'static str, value: String },

    /// Score slider outside 0..=100
    #[error("{field} must be between 0 and 100, got {value}")]
    ScoreOutOfRange { field: &'static str, value: i64 },

    /// Encoder and classifier disagree on the feature columns
    #[error("Feature schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Request body could not be decoded
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Batch upload could not be read as CSV
    #[error("Invalid CSV input: {0}")]
    InvalidCsv(String),

    /// A single record of a batch was rejected
    #[error("Row {row}: {source}")]
    BatchRecord {
        row: usize,
        #[source]
        source: Box<PredictorError>,
    },

    /// Classifier failed to produce a prediction
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PredictorError {
    pub fn error_code(&self) -> &str {
        match self {
            PredictorError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            PredictorError::InvalidCategory { .. } => "INVALID_CATEGORY",
            PredictorError::ScoreOutOfRange { .. } => "SCORE_OUT_OF_RANGE",
            PredictorError::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            PredictorError::InvalidRequest(_) => "INVALID_REQUEST",
            PredictorError::InvalidCsv(_) => "INVALID_CSV",
            PredictorError::BatchRecord { .. } => "INVALID_BATCH_RECORD",
            PredictorError::Inference(_) => "INFERENCE_ERROR",
        }
    }
}

impl From<csv::Error> for PredictorError {
    fn from(err: csv::Error) -> Self {
        PredictorError::InvalidCsv(err.to_string())
    }
}

impl From<serde_json::Error> for PredictorError {
    fn from(err: serde_json::Error) -> Self {
        PredictorError::ModelLoad(err.to_string())
    }
}

impl ResponseError for PredictorError {
    fn status_code(&self) -> StatusCode {
        match self {
            PredictorError::InvalidCategory { .. }
            | PredictorError::ScoreOutOfRange { .. }
            | PredictorError::InvalidRequest(_)
            | PredictorError::InvalidCsv(_)
            | PredictorError::BatchRecord { .. } => StatusCode::BAD_REQUEST,
            PredictorError::ModelLoad(_)
            | PredictorError::SchemaMismatch(_)
            | PredictorError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(error_code = self.error_code(), message = %message, "Prediction failed");
        } else {
            tracing::warn!(error_code = self.error_code(), message = %message, "Rejected input");
        }

        HttpResponse::build(status).json(json!({
            "error": {
                "code": self.error_code(),
                "message": message,
                "status": status.as_u16(),
            }
        }))
    }
}

pub type Result<T> = std::result::Result<T, PredictorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        let invalid = PredictorError::InvalidCategory {
            field: "gender",
            value: "other".to_string(),
        };
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PredictorError::SchemaMismatch("16 != 17".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PredictorError::ModelLoad("missing".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_batch_record_message_names_row() {
        let err = PredictorError::BatchRecord {
            row: 3,
            source: Box::new(PredictorError::ScoreOutOfRange {
                field: "math score",
                value: 140,
            }),
        };
        assert_eq!(err.to_string(), "Row 3: math score must be between 0 and 100, got 140");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
