//! ONNX artifacts loaded from disk and served through the router.
//!
//! `fixtures/iris_argmax.onnx` is a MatMul against a fixed [4, 2] weight
//! followed by ArgMax: output `label` (int64 [N]) then `scores` (float [N, 2]).
//! Column 0 scores `x2 - x3 - x4`, column 1 its negation.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use model_serve::api::{self, AppState};
use model_serve::config::ModelConfig;
use model_serve::{ModelLoader, Prediction};
use serde_json::{json, Value};
use std::path::PathBuf;
use tower::ServiceExt;

const SETOSA: [f64; 4] = [5.1, 3.5, 1.4, 0.2];
const VIRGINICA: [f64; 4] = [6.3, 2.9, 5.6, 1.8];

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/iris_argmax.onnx")
}

#[test]
fn loads_fixture_metadata() {
    let model = ModelLoader::new().load(fixture()).unwrap();

    assert_eq!(model.format(), "onnx");
    assert_eq!(model.name(), "iris_argmax");
    assert_eq!(model.expected_features(), Some(4));
}

#[test]
fn first_output_yields_labels() {
    let model = ModelLoader::new().load(fixture()).unwrap();

    let out = model.predict(&[SETOSA.to_vec()]).unwrap();
    assert_eq!(out, vec![Prediction::Label(0)]);

    let out = model.predict(&[VIRGINICA.to_vec()]).unwrap();
    assert_eq!(out, vec![Prediction::Label(1)]);

    let out = model
        .predict(&[VIRGINICA.to_vec(), SETOSA.to_vec()])
        .unwrap();
    assert_eq!(out, vec![Prediction::Label(1), Prediction::Label(0)]);
}

#[test]
fn named_output_yields_first_score() {
    let config = ModelConfig {
        path: fixture(),
        onnx_threads: 1,
        output_name: Some("scores".to_string()),
    };
    let model = ModelLoader::from_config(&config).load(&config.path).unwrap();

    let out = model.predict(&[SETOSA.to_vec()]).unwrap();
    match out[0] {
        Prediction::Value(score) => assert!((score - 1.9).abs() < 1e-5),
        other => panic!("expected a float score, got {:?}", other),
    }
}

#[test]
fn unknown_output_name_fails_to_load() {
    let config = ModelConfig {
        path: fixture(),
        onnx_threads: 1,
        output_name: Some("probabilities".to_string()),
    };
    let err = ModelLoader::from_config(&config)
        .load(&config.path)
        .err()
        .unwrap();
    assert!(format!("{:#}", err).contains("probabilities"));
}

async fn post_predict(body: &str) -> (StatusCode, Value) {
    let model = ModelLoader::new().load(fixture()).unwrap();
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = api::router(AppState::new(model))
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn predict_route_serves_onnx_label() {
    let (status, body) = post_predict(&json!({ "features": SETOSA }).to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"prediction": 0}));
}

#[tokio::test]
async fn predict_route_rejects_wrong_width() {
    let (status, body) = post_predict(r#"{"features": [1.0, 2.0]}"#).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "expected 4 features, got 2");
}
