//! Model formats and the loader that picks between them

pub mod linear;
pub mod loader;
pub mod onnx;
pub mod predictor;

pub use linear::{LinearArtifact, LinearModel, LinearTask};
pub use loader::ModelLoader;
pub use onnx::OnnxModel;
pub use predictor::{Prediction, Predictor};
