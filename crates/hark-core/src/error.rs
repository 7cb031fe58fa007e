//! Error taxonomy for the recognition pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The recognizer could not be constructed.
    #[error("recognizer build failed: {0}")]
    Build(String),

    /// The recognizer's internal communication pipe was closed or broken.
    /// This is the only fault class that warrants discarding the instance
    /// and rebuilding it.
    #[error("recognizer pipe closed: {0}")]
    PipeClosed(String),

    /// Any other failure reported while transcribing.
    #[error("transcription failed: {0}")]
    Inference(String),

    /// Failure writing or removing a staged input file.
    #[error("staging I/O failed: {0}")]
    Staging(#[from] std::io::Error),

    /// The worker produced output the bridge could not interpret.
    #[error("malformed worker response: {0}")]
    Protocol(String),
}

impl Error {
    /// Whether this fault is recoverable by tearing down the recognizer and
    /// building a fresh one. Only a closed worker pipe qualifies; bad audio,
    /// model errors, and staging failures must not trigger a rebuild.
    pub fn is_pipe_fault(&self) -> bool {
        match self {
            Error::PipeClosed(_) => true,
            Error::Staging(io) => io.kind() == std::io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}
