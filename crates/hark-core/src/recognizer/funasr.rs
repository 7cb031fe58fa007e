//! Bridge to the FunASR worker process.
//!
//! The worker is a Python script speaking newline-delimited JSON on
//! stdin/stdout. Building a recognizer spawns the worker and blocks until it
//! reports the model loaded, which can take several seconds. A closed worker
//! pipe at any point maps to [`Error::PipeClosed`], the one fault class the
//! caller may recover from by rebuilding.

use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::{Hub, ServiceConfig};
use crate::error::{Error, Result};
use crate::recognizer::{Recognizer, RecognizerFactory, Segment};

/// Seconds of audio batched per decode step by the worker.
const BATCH_SIZE_S: u32 = 300;

#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    input: &'a str,
    batch_size_s: u32,
}

#[derive(Debug, Deserialize)]
struct WorkerResponse {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    segments: Option<Vec<Segment>>,
    #[serde(default)]
    error: Option<String>,
}

/// Builds subprocess-backed recognizers from fixed launch parameters.
pub struct FunAsrFactory {
    worker_script: PathBuf,
    python_cmd: String,
    hub: Hub,
}

impl FunAsrFactory {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            worker_script: config.worker_script.clone(),
            python_cmd: config.python_cmd.clone(),
            hub: config.hub,
        }
    }
}

impl RecognizerFactory for FunAsrFactory {
    fn build(&self) -> Result<Arc<dyn Recognizer>> {
        let recognizer =
            FunAsrRecognizer::spawn(&self.python_cmd, &self.worker_script, self.hub)?;
        Ok(Arc::new(recognizer))
    }
}

struct WorkerChannel {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// A live worker process. Owned exclusively through the model manager; the
/// internal lock only keeps the request/response framing coherent.
pub struct FunAsrRecognizer {
    channel: Mutex<WorkerChannel>,
}

impl FunAsrRecognizer {
    fn spawn(python_cmd: &str, worker_script: &std::path::Path, hub: Hub) -> Result<Self> {
        info!(script = %worker_script.display(), hub = hub.as_str(), "starting recognizer worker");

        let mut child = Command::new(python_cmd)
            .arg(worker_script)
            .arg("--hub")
            .arg(hub.as_str())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Build(format!("failed to start worker: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Build("worker stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Build("worker stdout not captured".to_string()))?;

        let mut channel = WorkerChannel {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        // Model load happens inside the worker before it reports ready.
        match read_response(&mut channel.stdout) {
            Ok(response) if response.event.as_deref() == Some("ready") => {
                info!("recognizer worker ready");
                Ok(Self {
                    channel: Mutex::new(channel),
                })
            }
            Ok(response) => {
                let cause = response
                    .error
                    .unwrap_or_else(|| "worker did not report ready".to_string());
                let _ = channel.child.kill();
                let _ = channel.child.wait();
                Err(Error::Build(cause))
            }
            Err(e) => {
                let _ = channel.child.kill();
                let _ = channel.child.wait();
                Err(Error::Build(format!("worker failed during load: {e}")))
            }
        }
    }
}

impl Recognizer for FunAsrRecognizer {
    fn transcribe(&self, input: &str) -> Result<Vec<Segment>> {
        let request = WorkerRequest {
            input,
            batch_size_s: BATCH_SIZE_S,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| Error::Protocol(format!("failed to serialize request: {e}")))?;
        line.push('\n');

        let mut channel = self
            .channel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        debug!(input, "sending transcription request to worker");
        channel
            .stdin
            .write_all(line.as_bytes())
            .map_err(map_channel_io)?;
        channel.stdin.flush().map_err(map_channel_io)?;

        let response = read_response(&mut channel.stdout)?;
        if let Some(cause) = response.error {
            return Err(Error::Inference(cause));
        }
        response
            .segments
            .ok_or_else(|| Error::Protocol("response carried neither segments nor error".into()))
    }
}

impl Drop for FunAsrRecognizer {
    fn drop(&mut self) {
        let channel = match self.channel.get_mut() {
            Ok(channel) => channel,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = channel.child.kill() {
            debug!("worker already exited: {e}");
        }
        if let Err(e) = channel.child.wait() {
            warn!("failed to reap worker: {e}");
        }
    }
}

/// Read one JSON response line, skipping blanks. EOF means the worker's
/// output pipe closed underneath us.
fn read_response(stdout: &mut BufReader<ChildStdout>) -> Result<WorkerResponse> {
    loop {
        let mut line = String::new();
        let n = stdout.read_line(&mut line).map_err(map_channel_io)?;
        if n == 0 {
            return Err(Error::PipeClosed("worker closed its output pipe".into()));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return serde_json::from_str(trimmed)
            .map_err(|e| Error::Protocol(format!("unparseable worker line: {e}: {trimmed}")));
    }
}

/// Classify an I/O failure on the worker channel. A broken pipe means the
/// worker died and the instance must not be reused; anything else is an
/// ordinary inference failure.
fn map_channel_io(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
            Error::PipeClosed(e.to_string())
        }
        _ => Error::Inference(format!("worker I/O failed: {e}")),
    }
}
