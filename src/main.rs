//! Model Server - Main Entry Point
//!
//! Loads the configured model artifact and serves `GET /` and
//! `POST /predict` until interrupted.

use anyhow::{Context, Result};
use model_serve::{
    api::{self, AppState},
    config::{AppConfig, LogFormat, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::ModelLoader,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;

    init_logging(&config.logging)?;
    info!("Starting model server");
    info!(
        model = %config.model.path.display(),
        host = %config.server.host,
        port = config.server.port,
        legacy_error_status = config.server.legacy_error_status,
        "Configuration loaded"
    );
    if config.server.legacy_error_status {
        warn!("Legacy error status enabled: /predict errors will be answered with HTTP 200");
    }

    // A missing or corrupt artifact is fatal
    let predictor = ModelLoader::from_config(&config.model)
        .load(&config.model.path)
        .context("Failed to load model")?;

    let metrics = Arc::new(ServiceMetrics::new());
    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = AppState::new(predictor)
        .with_metrics(metrics.clone())
        .with_legacy_error_status(config.server.legacy_error_status)
        .with_max_body_bytes(config.server.max_body_bytes);

    let addr = config.server.bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    api::serve(listener, state, shutdown_signal()).await?;

    info!("Model server shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_logging(logging: &LoggingConfig) -> Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
