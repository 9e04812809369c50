//! Model artifact loader

use crate::config::ModelConfig;
use crate::models::linear::{LinearArtifact, LinearModel};
use crate::models::onnx::OnnxModel;
use crate::models::predictor::Predictor;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Loads a predictor from disk once, at startup
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    /// ONNX output to read predictions from
    output_name: Option<String>,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
            output_name: None,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            onnx_threads: config.onnx_threads.max(1),
            output_name: config.output_name.clone(),
        }
    }

    /// Load the artifact at `path`, picking the format from its extension.
    ///
    /// Fails if the file is missing, unreadable, corrupt or of an unknown
    /// format; callers treat that as fatal.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<dyn Predictor>> {
        let path = path.as_ref();

        if !path.is_file() {
            anyhow::bail!("Model artifact not found at {}", path.display());
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let predictor: Arc<dyn Predictor> = match extension.as_deref() {
            Some("onnx") => {
                ort::init().commit()?;
                info!(onnx_threads = self.onnx_threads, "ONNX Runtime initialized");
                Arc::new(OnnxModel::load(
                    path,
                    &name,
                    self.onnx_threads,
                    self.output_name.as_deref(),
                )?)
            }
            Some("json") => Arc::new(self.load_linear(path, &name)?),
            other => anyhow::bail!(
                "Unsupported model format {:?} for {} (expected .onnx or .json)",
                other.unwrap_or(""),
                path.display()
            ),
        };

        info!(
            model = %predictor.name(),
            format = predictor.format(),
            n_features = ?predictor.expected_features(),
            path = %path.display(),
            "Model ready"
        );

        Ok(predictor)
    }

    fn load_linear(&self, path: &Path, name: &str) -> Result<LinearModel> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model from {}", path.display()))?;
        let artifact: LinearArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("Corrupt linear model artifact {}", path.display()))?;

        LinearModel::new(name, artifact)
            .with_context(|| format!("Invalid linear model artifact {}", path.display()))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::predictor::Prediction;
    use std::io::Write;

    fn write_artifact(dir: &tempfile::TempDir, file: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(file);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_linear_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(
            &dir,
            "iris.json",
            r#"{"weights": [1.0, 0.0, 0.0, 0.0], "intercept": 1.0}"#,
        );

        let predictor = ModelLoader::new().load(&path).unwrap();
        assert_eq!(predictor.name(), "iris");
        assert_eq!(predictor.format(), "linear");
        assert_eq!(predictor.expected_features(), Some(4));

        let out = predictor.predict(&[vec![2.0, 9.0, 9.0, 9.0]]).unwrap();
        assert_eq!(out, vec![Prediction::Value(3.0)]);
    }

    #[test]
    fn test_missing_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelLoader::new()
            .load(dir.path().join("model.json"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(&dir, "model.json", "{\"weights\": [1.0,");
        let err = ModelLoader::new().load(&path).err().unwrap();
        assert!(err.to_string().contains("Corrupt"));
    }

    #[test]
    fn test_unknown_format_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_artifact(&dir, "model.pkl", "binary");
        let err = ModelLoader::new().load(&path).err().unwrap();
        assert!(err.to_string().contains("Unsupported model format"));
    }

    #[test]
    fn test_threads_clamped() {
        let loader = ModelLoader::with_threads(0);
        assert_eq!(loader.onnx_threads, 1);
    }
}
