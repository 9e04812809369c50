//! Predictor abstraction shared by every model format

use crate::error::InferenceError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scalar model output for one input row.
///
/// Classifiers produce integer labels, regressors produce floats. Both
/// serialize as a bare JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Label(i64),
    Value(f64),
}

impl Prediction {
    /// JSON has no representation for NaN or infinity
    pub fn is_finite(&self) -> bool {
        match self {
            Prediction::Label(_) => true,
            Prediction::Value(v) => v.is_finite(),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Prediction::Label(v) => *v as f64,
            Prediction::Value(v) => *v,
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prediction::Label(v) => write!(f, "{}", v),
            Prediction::Value(v) => write!(f, "{}", v),
        }
    }
}

/// A loaded, immutable model.
///
/// Implementations are shared across request handlers behind an `Arc`, so
/// `predict` takes `&self`.
pub trait Predictor: Send + Sync {
    /// Human readable model name (usually the artifact file stem)
    fn name(&self) -> &str;

    /// Artifact format, e.g. "onnx" or "linear"
    fn format(&self) -> &'static str;

    /// Number of features per row, if the model declares it
    fn expected_features(&self) -> Option<usize>;

    /// Run the model on a batch of rows, returning one prediction per row
    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Prediction>, InferenceError>;
}

/// Check a batch against the model's declared shape.
///
/// Returns the common row width.
pub fn validate_batch(
    batch: &[Vec<f64>],
    expected: Option<usize>,
) -> Result<usize, InferenceError> {
    let first = batch.first().ok_or(InferenceError::EmptyBatch)?;
    if first.is_empty() {
        return Err(InferenceError::EmptyFeatures);
    }

    let width = expected.unwrap_or(first.len());
    for row in batch {
        if row.len() != width {
            return Err(InferenceError::FeatureCount {
                expected: width,
                actual: row.len(),
            });
        }
    }

    Ok(width)
}
