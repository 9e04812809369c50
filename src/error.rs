//! Error types for prediction requests

use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;

/// Errors raised by a predictor while running a batch.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("input batch is empty")]
    EmptyBatch,

    #[error("features must not be empty")]
    EmptyFeatures,

    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("{0}")]
    Runtime(String),
}

impl From<ort::Error> for InferenceError {
    fn from(err: ort::Error) -> Self {
        InferenceError::Runtime(err.to_string())
    }
}

/// Everything that can go wrong while handling `POST /predict`.
///
/// Each variant maps to its own HTTP status, unless the server runs with
/// `legacy_error_status`, in which case every error is answered with 200.
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    /// Body is not syntactically valid JSON
    #[error("malformed JSON body: {0}")]
    MalformedJson(String),

    /// Body exceeds the configured size limit
    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    /// Body parsed but `features` is missing, mistyped or the wrong shape
    #[error("{0}")]
    InvalidInput(String),

    /// The predictor failed at runtime
    #[error("inference failed: {0}")]
    Inference(String),

    /// The prediction cannot be represented in JSON
    #[error("failed to serialize prediction: {0}")]
    Serialization(String),
}

impl PredictError {
    /// Short machine-readable label, used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::MalformedJson(_) => "malformed_json",
            PredictError::PayloadTooLarge(_) => "payload_too_large",
            PredictError::InvalidInput(_) => "invalid_input",
            PredictError::Inference(_) => "inference",
            PredictError::Serialization(_) => "serialization",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictError::MalformedJson(_) => StatusCode::BAD_REQUEST,
            PredictError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            PredictError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PredictError::Inference(_) | PredictError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

impl From<serde_json::Error> for PredictError {
    fn from(err: serde_json::Error) -> Self {
        use serde_json::error::Category;

        match err.classify() {
            Category::Syntax | Category::Eof => PredictError::MalformedJson(err.to_string()),
            Category::Data => PredictError::InvalidInput(err.to_string()),
            Category::Io => PredictError::Serialization(err.to_string()),
        }
    }
}

impl From<BytesRejection> for PredictError {
    fn from(rejection: BytesRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            PredictError::PayloadTooLarge(rejection.body_text())
        } else {
            PredictError::MalformedJson(rejection.body_text())
        }
    }
}

impl From<InferenceError> for PredictError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Runtime(msg) => PredictError::Inference(msg),
            other => PredictError::InvalidInput(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_errors_are_classified() {
        let syntax = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(PredictError::from(syntax).kind(), "malformed_json");

        let eof = serde_json::from_str::<serde_json::Value>("").unwrap_err();
        assert_eq!(PredictError::from(eof).kind(), "malformed_json");

        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Body {
            features: Vec<f64>,
        }
        let missing = serde_json::from_str::<Body>("{}").unwrap_err();
        let err = PredictError::from(missing);
        assert_eq!(err.kind(), "invalid_input");
        assert!(err.to_string().contains("features"));
    }

    #[test]
    fn test_inference_errors_split_by_fault() {
        let shape = PredictError::from(InferenceError::FeatureCount {
            expected: 4,
            actual: 2,
        });
        assert_eq!(shape.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(shape.is_client_error());

        let runtime = PredictError::from(InferenceError::Runtime("boom".to_string()));
        assert_eq!(runtime.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(runtime.to_string(), "inference failed: boom");
    }
}
