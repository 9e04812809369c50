//! Linear model artifacts stored as JSON
//!
//! A lightweight alternative to ONNX for models that are just a weight
//! vector and an intercept:
//!
//! ```json
//! {"weights": [0.4, -1.2, 3.0], "intercept": 0.1, "task": {"type": "regression"}}
//! ```

use crate::error::InferenceError;
use crate::models::predictor::{validate_batch, Prediction, Predictor};
use serde::{Deserialize, Serialize};

/// What the linear score means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LinearTask {
    /// Return the raw score `w·x + b`
    #[default]
    Regression,
    /// Logistic regression: label 1 when `sigmoid(w·x + b) >= threshold`
    Classification {
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
}

fn default_threshold() -> f64 {
    0.5
}

/// On-disk representation of a linear model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearArtifact {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub task: LinearTask,
}

/// Linear predictor loaded from a [`LinearArtifact`]
#[derive(Debug, Clone)]
pub struct LinearModel {
    name: String,
    artifact: LinearArtifact,
}

impl LinearModel {
    pub fn new(name: &str, artifact: LinearArtifact) -> Result<Self, InferenceError> {
        if artifact.weights.is_empty() {
            return Err(InferenceError::Runtime(
                "linear model has no weights".to_string(),
            ));
        }
        if let LinearTask::Classification { threshold } = artifact.task {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(InferenceError::Runtime(format!(
                    "classification threshold {} outside [0, 1]",
                    threshold
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            artifact,
        })
    }

    /// Raw linear score for one row
    fn score(&self, row: &[f64]) -> f64 {
        self.artifact
            .weights
            .iter()
            .zip(row)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.artifact.intercept
    }

    fn predict_row(&self, row: &[f64]) -> Result<Prediction, InferenceError> {
        let score = self.score(row);
        match self.artifact.task {
            LinearTask::Regression => Ok(Prediction::Value(score)),
            LinearTask::Classification { threshold } => {
                // NaN would compare false against the threshold and read as label 0
                if !score.is_finite() {
                    return Err(InferenceError::Runtime(format!(
                        "classification score is {}",
                        score
                    )));
                }
                let probability = 1.0 / (1.0 + (-score).exp());
                Ok(Prediction::Label(i64::from(probability >= threshold)))
            }
        }
    }
}

impl Predictor for LinearModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> &'static str {
        "linear"
    }

    fn expected_features(&self) -> Option<usize> {
        Some(self.artifact.weights.len())
    }

    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Prediction>, InferenceError> {
        validate_batch(batch, self.expected_features())?;
        batch.iter().map(|row| self.predict_row(row)).collect()
    }
}
