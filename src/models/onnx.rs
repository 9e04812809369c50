//! ONNX Runtime predictor

use crate::error::InferenceError;
use crate::models::predictor::{validate_batch, Prediction, Predictor};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{Tensor, ValueType};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// ONNX model with the metadata needed to feed and read it
pub struct OnnxModel {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    n_features: Option<usize>,
}

impl OnnxModel {
    /// Build a session from an `.onnx` file.
    ///
    /// `output_name` selects the graph output holding the prediction; when
    /// absent the first output is used, which is the label output for
    /// scikit-learn exports.
    pub fn load(path: &Path, name: &str, threads: usize, output_name: Option<&str>) -> Result<Self> {
        info!(model = %name, path = %path.display(), threads = threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load ONNX model from {}", path.display()))?;

        let input = session
            .inputs
            .first()
            .context("ONNX model declares no inputs")?;
        let input_name = input.name.clone();
        let n_features = match &input.input_type {
            ValueType::Tensor { shape, .. } => shape
                .last()
                .copied()
                .filter(|&dim| dim > 0)
                .map(|dim| dim as usize),
            _ => None,
        };

        let output_name = match output_name {
            Some(wanted) => {
                if !session.outputs.iter().any(|o| o.name == wanted) {
                    anyhow::bail!("ONNX model has no output named {:?}", wanted);
                }
                wanted.to_string()
            }
            None => session
                .outputs
                .first()
                .map(|o| o.name.clone())
                .context("ONNX model declares no outputs")?,
        };

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            n_features = ?n_features,
            "Model loaded successfully"
        );

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            output_name,
            n_features,
        })
    }
}

impl Predictor for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn format(&self) -> &'static str {
        "onnx"
    }

    fn expected_features(&self) -> Option<usize> {
        self.n_features
    }

    fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Prediction>, InferenceError> {
        let width = validate_batch(batch, self.n_features)?;
        let rows = batch.len();

        // Shape [rows, width]
        let data: Vec<f32> = batch.iter().flatten().map(|&x| x as f32).collect();
        let input_tensor = Tensor::from_array((vec![rows as i64, width as i64], data))?;

        let mut session = lock_session(&self.session);
        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::Runtime(format!("missing output {:?}", self.output_name))
        })?;

        // Labels come out as i64, regressors and scores as f32 or f64
        let predictions = if let Ok((shape, values)) = output.try_extract_tensor::<i64>() {
            first_per_row(shape, values, rows)?
                .into_iter()
                .map(Prediction::Label)
                .collect()
        } else if let Ok((shape, values)) = output.try_extract_tensor::<f32>() {
            first_per_row(shape, values, rows)?
                .into_iter()
                .map(|v| Prediction::Value(v as f64))
                .collect()
        } else if let Ok((shape, values)) = output.try_extract_tensor::<f64>() {
            first_per_row(shape, values, rows)?
                .into_iter()
                .map(Prediction::Value)
                .collect()
        } else {
            return Err(InferenceError::Runtime(format!(
                "output {:?} is not a numeric tensor",
                self.output_name
            )));
        };

        debug!(model = %self.name, rows = rows, "ONNX inference complete");
        Ok(predictions)
    }
}

/// Lock the session, recovering it if an earlier run panicked. A session
/// carries no state between runs, so a poisoned guard is still usable.
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Take the first element of each row from a `[rows]` or `[rows, k]` tensor
fn first_per_row<T: Copy>(
    shape: &[i64],
    values: &[T],
    rows: usize,
) -> Result<Vec<T>, InferenceError> {
    let stride = match shape {
        [_] => 1,
        [_, k] if *k > 0 => *k as usize,
        _ => {
            return Err(InferenceError::Runtime(format!(
                "unexpected output shape {:?}",
                shape
            )))
        }
    };

    if values.len() < rows * stride {
        return Err(InferenceError::Runtime(format!(
            "output holds {} values, expected at least {}",
            values.len(),
            rows * stride
        )));
    }

    Ok(values.chunks(stride).take(rows).map(|row| row[0]).collect())
}
