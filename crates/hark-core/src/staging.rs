//! Staging of request payloads onto the filesystem.
//!
//! Each request gets its own uniquely named temporary file; the file is
//! removed when the `StagedInput` drops, on every exit path. A file that is
//! already gone at release time is not an error.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// Fallback extension when the client filename gives no usable hint.
pub const DEFAULT_SUFFIX: &str = ".wav";

pub struct StagedInput {
    path: PathBuf,
}

impl StagedInput {
    /// Write `bytes` to a fresh temporary file carrying `suffix` and hand
    /// back its owner. Concurrent requests never collide; every call
    /// produces an independent path.
    pub fn stage(bytes: &[u8], suffix: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("hark-asr-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        let (_, path) = file.keep().map_err(|e| e.error)?;
        debug!(path = %path.display(), bytes = bytes.len(), "staged request input");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedInput {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), "failed to release staged input: {e}"),
        }
    }
}

/// Pick the staged-file suffix from a client-supplied filename.
pub fn suffix_for(filename: Option<&str>) -> String {
    filename
        .and_then(|name| {
            Path::new(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| format!(".{ext}"))
        })
        .unwrap_or_else(|| DEFAULT_SUFFIX.to_string())
}
