//! Hark Server - HTTP gateway for FunASR speech recognition

use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::info;

mod api;
mod error;
mod logging;
mod state;

use hark_core::{FunAsrFactory, Hub, ModelManager, ServiceConfig};
use state::AppState;

#[derive(Parser)]
#[command(
    name = "hark-server",
    about = "HTTP API server for FunASR speech recognition",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "10095", env = "HARK_PORT")]
    port: u16,

    /// Directory the worker uses as its model cache
    #[arg(long, env = "HARK_MODELS_DIR")]
    model_dir: Option<PathBuf>,

    /// Model hub backend
    #[arg(long, value_enum, default_value = "ms", env = "HARK_HUB")]
    hub: Hub,

    /// Alternate HuggingFace endpoint, e.g. https://hf-mirror.com
    #[arg(long, env = "HARK_HF_ENDPOINT")]
    hf_endpoint: Option<String>,

    /// Path to the recognizer worker script
    #[arg(long, env = "HARK_WORKER_SCRIPT")]
    worker_script: Option<PathBuf>,

    /// Python interpreter used to run the worker
    #[arg(long, env = "HARK_PYTHON")]
    python: Option<String>,
}

impl Cli {
    fn into_config(self) -> (u16, ServiceConfig) {
        let mut config = ServiceConfig {
            hub: self.hub,
            hf_endpoint: self.hf_endpoint,
            ..Default::default()
        };
        if let Some(dir) = self.model_dir {
            config.models_dir = dir;
        }
        if let Some(script) = self.worker_script {
            config.worker_script = script;
        }
        if let Some(python) = self.python {
            config.python_cmd = python;
        }
        (self.port, config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (port, config) = Cli::parse().into_config();

    // The worker reads the cache and endpoint settings only when it first
    // loads, so the environment must be in place before any build.
    std::fs::create_dir_all(&config.models_dir)?;
    config.apply_env();

    logging::init();

    info!("Starting Hark ASR Server");
    info!("Models directory: {:?}", config.models_dir);
    info!("Model hub: {}", config.hub.as_str());
    if let Some(endpoint) = config.hf_endpoint.as_deref() {
        info!("HF endpoint: {}", endpoint);
    }

    let manager = ModelManager::new(FunAsrFactory::new(&config));

    // Eager load: the first request must not pay the construction cost, and
    // a broken install should fail here rather than mid-traffic.
    info!("Loading ASR model...");
    manager.warm().await?;
    info!("Model loaded, server ready");

    let app = api::create_router(AppState::new(manager));

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for a shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        },
    }
}
