//! Hark Fetch - idempotent model asset acquisition
//!
//! Builds the recognizer once so the worker downloads (or validates) its
//! model files into the target directory, then writes the sentinel the
//! server and supervising apps look for. Progress is reported through fixed
//! stdout tokens so a calling process can scan for them:
//! `DOWNLOAD_START`, `DOWNLOAD_COMPLETE`, or `DOWNLOAD_ERROR: <cause>`.

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use hark_core::{FunAsrFactory, Hub, RecognizerFactory, ServiceConfig};

#[derive(Parser)]
#[command(
    name = "hark-fetch",
    about = "Download FunASR model assets into a local directory",
    version = env!("CARGO_PKG_VERSION"),
)]
struct Cli {
    /// Directory to store downloaded models (used as the worker's cache)
    #[arg(long, env = "HARK_MODELS_DIR")]
    model_dir: PathBuf,

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

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        println!("DOWNLOAD_ERROR: {e:#}");
        let _ = std::io::stdout().flush();
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ServiceConfig {
        models_dir: cli.model_dir,
        hub: cli.hub,
        hf_endpoint: cli.hf_endpoint,
        ..Default::default()
    };
    if let Some(script) = cli.worker_script {
        config.worker_script = script;
    }
    if let Some(python) = cli.python {
        config.python_cmd = python;
    }

    std::fs::create_dir_all(&config.models_dir)
        .with_context(|| format!("cannot create {}", config.models_dir.display()))?;
    // Must be exported before the worker starts; it reads the cache path at
    // load time.
    config.apply_env();

    println!("DOWNLOAD_START");
    println!("Model directory: {}", config.models_dir.display());
    println!("First download is several hundred MB; keep the network up.");
    let _ = std::io::stdout().flush();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("downloading/verifying recognition models...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    // The worker downloads its own weights the first time it loads; a
    // successful build therefore proves the assets are all in place.
    let factory = FunAsrFactory::new(&config);
    let outcome = factory.build();
    spinner.finish_and_clear();
    outcome.context("model acquisition failed")?;

    std::fs::write(config.sentinel_path(), "ok").with_context(|| {
        format!("cannot write sentinel {}", config.sentinel_path().display())
    })?;

    println!("DOWNLOAD_COMPLETE");
    let _ = std::io::stdout().flush();
    Ok(())
}
