//! Fraud Detection API - Main Entry Point
//!
//! Loads the classifier artifact, then serves predictions over HTTP.
//! The listener is only bound after the model has loaded.

use anyhow::{Context, Result};
use clap::Parser;
use fraud_detection_api::{
    api::{self, AppState},
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    models::FraudDetector,
    telemetry,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fraud-detection-api")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serve a credit card fraud classifier over HTTP", long_about = None)]
struct Args {
    /// Configuration file (defaults to config/config.toml when present)
    #[arg(short, long, env = "FRAUD_API_CONFIG")]
    config: Option<PathBuf>,

    /// Override the model artifact path
    #[arg(short, long, env = "FRAUD_API_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Override the listen host
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => AppConfig::load()
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_PATH))?,
    };
    if let Some(model) = args.model {
        config.model.path = model;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    // Initialize logging
    telemetry::init(&config.logging)?;

    info!("Starting {} v{}", config.service.name, config.service.version);
    info!(
        model_path = %config.model.path.display(),
        model_format = ?config.model.format,
        threshold = config.model.threshold,
        "Configuration loaded"
    );

    // A missing or unreadable artifact is fatal: never bind without a model.
    let detector = match FraudDetector::load(&config.model) {
        Ok(detector) => detector,
        Err(e) => {
            error!(error = %e, "Failed to load classifier artifact");
            return Err(e).context("Model load failed, refusing to serve");
        }
    };
    info!(
        model = %detector.model_name(),
        features = detector.feature_count(),
        "Inference engine initialized"
    );

    let app = api::router(AppState::new(detector, config.service.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
