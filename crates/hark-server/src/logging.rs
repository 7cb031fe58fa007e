//! Logging bootstrap with a pipe-safe sink.
//!
//! When the server runs detached under a supervisor, its stdio pipes can be
//! closed while it is still logging. Writes through this sink absorb
//! `BrokenPipe` instead of erroring, so a dead log pipe never takes down a
//! request. This guards only the process's own log writes; the
//! recognizer-level pipe fault class is handled in `hark_core`.

use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub struct PipeSafeWriter<W: Write> {
    inner: W,
}

impl<W: Write> PipeSafeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for PipeSafeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(buf.len()),
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.flush() {
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    }
}

#[derive(Clone, Default)]
pub struct PipeSafeStderr;

impl<'a> MakeWriter<'a> for PipeSafeStderr {
    type Writer = PipeSafeWriter<io::Stderr>;

    fn make_writer(&'a self) -> Self::Writer {
        PipeSafeWriter::new(io::stderr())
    }
}

/// Initialize tracing once at startup.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hark_server=debug,hark_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(PipeSafeStderr))
        .init();
}
