//! HTTP API: a status route and the prediction endpoint

use crate::error::PredictError;
use crate::metrics::ServiceMetrics;
use crate::models::predictor::{Prediction, Predictor};
use crate::types::{PredictRequest, PredictResponse};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Body of `GET /`
pub const STATUS_MESSAGE: &str = "Model is running!";

/// Largest accepted `/predict` body unless configured otherwise
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Loaded once at startup, never mutated
    pub predictor: Arc<dyn Predictor>,
    pub metrics: Arc<ServiceMetrics>,
    /// Answer errors with 200 instead of their own status
    pub legacy_error_status: bool,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(predictor: Arc<dyn Predictor>) -> Self {
        Self {
            predictor,
            metrics: Arc::new(ServiceMetrics::new()),
            legacy_error_status: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_legacy_error_status(mut self, enabled: bool) -> Self {
        self.legacy_error_status = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .layer(body_limit)
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, "Listening for prediction requests");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn home() -> &'static str {
    STATUS_MESSAGE
}

async fn predict(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();

    let result = match body {
        Ok(body) => predict_blocking(state.predictor.clone(), body).await,
        Err(rejection) => Err(PredictError::from(rejection)),
    };

    match result {
        Ok(prediction) => {
            state.metrics.record_success(start.elapsed());
            debug!(
                model = %state.predictor.name(),
                prediction = %prediction,
                elapsed_us = start.elapsed().as_micros() as u64,
                "Prediction served"
            );
            (StatusCode::OK, Json(PredictResponse::prediction(prediction))).into_response()
        }
        Err(err) => {
            state.metrics.record_error(err.kind(), start.elapsed());
            if err.is_client_error() {
                warn!(kind = err.kind(), error = %err, "Rejected prediction request");
            } else {
                error!(kind = err.kind(), error = %err, "Prediction failed");
            }

            let status = if state.legacy_error_status {
                StatusCode::OK
            } else {
                err.status_code()
            };
            (status, Json(PredictResponse::error(err.to_string()))).into_response()
        }
    }
}

/// Run [`run_prediction`] on the blocking pool so a slow or locked model
/// never parks a runtime worker. A panicking model becomes an
/// `Inference` error.
pub async fn predict_blocking(
    predictor: Arc<dyn Predictor>,
    body: Bytes,
) -> Result<Prediction, PredictError> {
    tokio::task::spawn_blocking(move || run_prediction(predictor.as_ref(), &body))
        .await
        .map_err(|e| {
            if e.is_panic() {
                PredictError::Inference("predictor panicked".to_string())
            } else {
                PredictError::Inference(format!("prediction task failed: {}", e))
            }
        })?
}

/// Decode a `/predict` body, run it as a single-row batch and return the
/// row's prediction
pub fn run_prediction(predictor: &dyn Predictor, body: &[u8]) -> Result<Prediction, PredictError> {
    let request: PredictRequest = serde_json::from_slice(body)?;
    let batch = vec![request.features];

    let prediction = predictor
        .predict(&batch)?
        .into_iter()
        .next()
        .ok_or_else(|| PredictError::Inference("predictor returned no output".to_string()))?;

    if !prediction.is_finite() {
        return Err(PredictError::Serialization(format!(
            "{} is not a valid JSON number",
            prediction
        )));
    }

    Ok(prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;

    /// Sums the row; fails on negative input; panics on 666
    struct SumModel;

    impl Predictor for SumModel {
        fn name(&self) -> &str {
            "sum"
        }

        fn format(&self) -> &'static str {
            "test"
        }

        fn expected_features(&self) -> Option<usize> {
            None
        }

        fn predict(&self, batch: &[Vec<f64>]) -> Result<Vec<Prediction>, InferenceError> {
            batch
                .iter()
                .map(|row| {
                    if row.contains(&666.0) {
                        panic!("cursed input");
                    }
                    if row.iter().any(|&x| x < 0.0) {
                        return Err(InferenceError::Runtime("negative input".to_string()));
                    }
                    if row.contains(&0.0) {
                        return Ok(Prediction::Value(f64::NAN));
                    }
                    Ok(Prediction::Value(row.iter().sum()))
                })
                .collect()
        }
    }

    #[test]
    fn test_run_prediction_success() {
        let out = run_prediction(&SumModel, br#"{"features": [1.0, 2.5]}"#).unwrap();
        assert_eq!(out, Prediction::Value(3.5));
    }

    #[test]
    fn test_run_prediction_error_kinds() {
        let kind = |body: &[u8]| run_prediction(&SumModel, body).unwrap_err().kind();

        assert_eq!(kind(b"not json"), "malformed_json");
        assert_eq!(kind(b""), "malformed_json");
        assert_eq!(kind(b"{}"), "invalid_input");
        assert_eq!(kind(br#"{"features": "abc"}"#), "invalid_input");
        assert_eq!(kind(br#"{"features": [-1.0]}"#), "inference");
        assert_eq!(kind(br#"{"features": [0.0]}"#), "serialization");
    }

    #[tokio::test]
    async fn test_blocking_prediction_catches_panics() {
        let body = Bytes::from_static(br#"{"features": [666.0]}"#);
        let err = predict_blocking(Arc::new(SumModel), body).await.unwrap_err();
        assert_eq!(err.kind(), "inference");
        assert!(err.to_string().contains("panicked"));
    }

    #[tokio::test]
    async fn test_blocking_prediction_success() {
        let body = Bytes::from_static(br#"{"features": [2.0, 2.0]}"#);
        let out = predict_blocking(Arc::new(SumModel), body).await.unwrap();
        assert_eq!(out, Prediction::Value(4.0));
    }

    #[test]
    fn test_missing_field_names_the_field() {
        let err = run_prediction(&SumModel, b"{}").unwrap_err();
        assert!(err.to_string().contains("features"));
    }
}
