//! Recognizer abstraction and result types.

mod funasr;

pub use funasr::{FunAsrFactory, FunAsrRecognizer};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// One recognized span of audio. The worker may attach extra fields
/// (timestamps, keys per input file); those pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            key: None,
            text: text.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Concatenate segment texts in order, with no separator.
pub fn join_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// A speech-to-text capability. Expensive to construct; `transcribe` is
/// synchronous and can run for tens of seconds on long audio.
pub trait Recognizer: Send + Sync {
    /// Transcribe a local file path or an http(s) URL the worker fetches
    /// itself.
    fn transcribe(&self, input: &str) -> Result<Vec<Segment>>;
}

/// Builds recognizer instances. Construction may fail; the caller decides
/// when a failed or faulted instance is rebuilt.
pub trait RecognizerFactory: Send + Sync + 'static {
    fn build(&self) -> Result<Arc<dyn Recognizer>>;
}
