//! Model Serving Library
//!
//! Loads a pre-trained model artifact once at startup and exposes its
//! `predict` operation over a small JSON HTTP API.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod models;
pub mod types;

pub use api::{router, AppState};
pub use config::AppConfig;
pub use error::{InferenceError, PredictError};
pub use metrics::ServiceMetrics;
pub use models::{ModelLoader, Prediction, Predictor};
pub use types::{PredictRequest, PredictResponse};
