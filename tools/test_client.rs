//! Test Prediction Client
//!
//! Generates feature vectors and posts them to a running model server.
//!
//! Usage: test_client [base_url] [count] [n_features] [delay_ms] [invalid_rate]

use rand::Rng;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Request body generator for testing
struct PayloadGenerator {
    rng: rand::rngs::ThreadRng,
    n_features: usize,
}

impl PayloadGenerator {
    fn new(n_features: usize) -> Self {
        Self {
            rng: rand::thread_rng(),
            n_features,
        }
    }

    /// A well-formed request with values in a flower-measurement-like range
    fn generate_valid(&mut self) -> Value {
        let features: Vec<f64> = (0..self.n_features)
            .map(|_| (self.rng.gen_range(0.1..8.0_f64) * 10.0).round() / 10.0)
            .collect();
        json!({ "features": features })
    }

    /// A request the server should reject
    fn generate_invalid(&mut self) -> Value {
        match self.rng.gen_range(0..3) {
            0 => json!({}),
            1 => json!({ "features": "not a vector" }),
            _ => json!({ "features": [] }),
        }
    }
}

/// Positional command line arguments
#[derive(Debug, PartialEq)]
struct ClientArgs {
    base_url: String,
    count: u64,
    n_features: usize,
    delay_ms: u64,
    invalid_rate: f64,
}

impl ClientArgs {
    /// `args[0]` is the program name; missing or unparsable values fall back
    /// to defaults
    fn parse(args: &[String]) -> Self {
        Self {
            base_url: args
                .get(1)
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://127.0.0.1:5000".to_string()),
            count: args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100),
            n_features: args.get(3).and_then(|s| s.parse().ok()).unwrap_or(4),
            delay_ms: args.get(4).and_then(|s| s.parse().ok()).unwrap_or(50),
            invalid_rate: args
                .get(5)
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|r| !r.is_nan())
                .unwrap_or(0.1)
                .clamp(0.0, 1.0),
        }
    }
}

/// Result of one `/predict` call
#[derive(Debug, PartialEq)]
enum Outcome {
    Prediction,
    ErrorResponse { status: u16, body: String },
    /// Transport failure or a body that is not JSON
    Failed(String),
}

impl Outcome {
    fn from_response(status: u16, text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(body) if body.get("prediction").is_some() => Outcome::Prediction,
            Ok(body) => Outcome::ErrorResponse {
                status,
                body: body.to_string(),
            },
            Err(e) => Outcome::Failed(format!("status {} with non-JSON body: {}", status, e)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting test prediction client");

    let args: Vec<String> = std::env::args().collect();
    let ClientArgs {
        base_url,
        count,
        n_features,
        delay_ms,
        invalid_rate,
    } = ClientArgs::parse(&args);

    info!(
        base_url = %base_url,
        count = count,
        n_features = n_features,
        invalid_rate = invalid_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::new();
    match client.get(format!("{}/", base_url)).send().await {
        Ok(resp) => {
            let status = resp.text().await.unwrap_or_default();
            info!(status = %status, "Server reachable");
        }
        Err(e) => {
            warn!(error = %e, "Server unreachable. Running in dry-run mode.");
            return run_dry_mode(count, n_features, invalid_rate, delay_ms).await;
        }
    }

    let mut generator = PayloadGenerator::new(n_features);
    let mut rng = rand::thread_rng();
    let predict_url = format!("{}/predict", base_url);

    let mut predictions = 0u64;
    let mut errors = 0u64;
    let mut total_latency = Duration::ZERO;

    for i in 0..count {
        let payload = if rng.gen_bool(invalid_rate) {
            generator.generate_invalid()
        } else {
            generator.generate_valid()
        };

        let start = Instant::now();
        let outcome = match client.post(&predict_url).json(&payload).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.text().await {
                    Ok(text) => Outcome::from_response(status, &text),
                    Err(e) => Outcome::Failed(format!("failed to read body: {}", e)),
                }
            }
            Err(e) => Outcome::Failed(format!("request failed: {}", e)),
        };
        total_latency += start.elapsed();

        match outcome {
            Outcome::Prediction => predictions += 1,
            Outcome::ErrorResponse { status, body } => {
                errors += 1;
                warn!(status = status, body = %body, "Error response");
            }
            Outcome::Failed(reason) => {
                errors += 1;
                warn!(request = i + 1, reason = %reason, "Request failed");
            }
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} requests ({} predictions, {} errors)",
                i + 1,
                count,
                predictions,
                errors
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let mean_us = if count > 0 {
        total_latency.as_micros() as u64 / count
    } else {
        0
    };
    info!(
        "Completed! Sent {} requests ({} predictions, {} errors, mean latency {} us)",
        count, predictions, errors, mean_us
    );

    Ok(())
}

async fn run_dry_mode(
    count: u64,
    n_features: usize,
    invalid_rate: f64,
    delay_ms: u64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no server connection)");

    let mut generator = PayloadGenerator::new(n_features);
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let payload = if rng.gen_bool(invalid_rate) {
            generator.generate_invalid()
        } else {
            generator.generate_valid()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample request {}:\n{}", i + 1, serde_json::to_string_pretty(&payload)?);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
