//! Configuration for the recognition service.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Sentinel written by the fetch tool once model assets are in place.
pub const SENTINEL_FILE: &str = ".downloaded";

/// Which hub the worker pulls model assets from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Hub {
    /// ModelScope (default).
    Ms,
    /// HuggingFace.
    Hf,
}

impl Hub {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hub::Ms => "ms",
            Hub::Hf => "hf",
        }
    }
}

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Directory the worker uses as its model cache.
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Hub backend the worker downloads from.
    #[serde(default = "default_hub")]
    pub hub: Hub,

    /// Alternate HuggingFace endpoint, e.g. a regional mirror.
    #[serde(default)]
    pub hf_endpoint: Option<String>,

    /// Path to the worker script the recognizer bridge spawns.
    #[serde(default = "default_worker_script")]
    pub worker_script: PathBuf,

    /// Python interpreter used to run the worker.
    #[serde(default = "default_python_cmd")]
    pub python_cmd: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            hub: default_hub(),
            hf_endpoint: None,
            worker_script: default_worker_script(),
            python_cmd: default_python_cmd(),
        }
    }
}

impl ServiceConfig {
    /// Export the model cache location and hub endpoint into the process
    /// environment. The worker reads these only when it first loads, so this
    /// must run before the first recognizer build.
    pub fn apply_env(&self) {
        std::env::set_var("MODELSCOPE_CACHE", &self.models_dir);
        if let Some(endpoint) = self.hf_endpoint.as_deref() {
            if !endpoint.trim().is_empty() {
                std::env::set_var("HF_ENDPOINT", endpoint.trim());
            }
        }
    }

    /// Path of the asset-acquisition sentinel inside the model directory.
    pub fn sentinel_path(&self) -> PathBuf {
        self.models_dir.join(SENTINEL_FILE)
    }
}

fn default_models_dir() -> PathBuf {
    if let Ok(from_env) = std::env::var("HARK_MODELS_DIR") {
        let trimmed = from_env.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hark")
        .join("models")
}

fn default_hub() -> Hub {
    Hub::Ms
}

fn default_worker_script() -> PathBuf {
    let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    base_dir.join("scripts/funasr_worker.py")
}

fn default_python_cmd() -> String {
    "python3".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Hub::Ms).unwrap(), "\"ms\"");
        assert_eq!(serde_json::to_string(&Hub::Hf).unwrap(), "\"hf\"");
    }

    #[test]
    fn sentinel_lives_in_models_dir() {
        let config = ServiceConfig {
            models_dir: PathBuf::from("/tmp/models"),
            ..Default::default()
        };
        assert_eq!(config.sentinel_path(), PathBuf::from("/tmp/models/.downloaded"));
    }
}
