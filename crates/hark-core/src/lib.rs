//! Hark Core - recognizer lifecycle for the ASR gateway
//!
//! This crate owns everything between the HTTP surface and the speech
//! recognition worker: the recognizer abstraction and its subprocess-backed
//! implementation, the single-slot lifecycle manager with its
//! rebuild-on-pipe-fault contract, request input staging, and service
//! configuration.

pub mod config;
pub mod error;
pub mod manager;
pub mod recognizer;
pub mod staging;

pub use config::{Hub, ServiceConfig, SENTINEL_FILE};
pub use error::{Error, Result};
pub use manager::ModelManager;
pub use recognizer::{
    join_text, FunAsrFactory, FunAsrRecognizer, Recognizer, RecognizerFactory, Segment,
};
pub use staging::{suffix_for, StagedInput, DEFAULT_SUFFIX};
