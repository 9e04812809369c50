//! Request and response bodies for `/predict`

use crate::models::predictor::Prediction;
use serde::{Deserialize, Serialize};

/// Body of `POST /predict`. Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    /// One input row, in the order the model was trained on
    pub features: Vec<f64>,
}

/// Body of every `/predict` response: exactly one of `prediction` or `error`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction { prediction: Prediction },
    Error { error: String },
}

impl PredictResponse {
    pub fn prediction(prediction: Prediction) -> Self {
        PredictResponse::Prediction { prediction }
    }

    pub fn error(message: impl Into<String>) -> Self {
        PredictResponse::Error {
            error: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, PredictResponse::Error { .. })
    }
}
