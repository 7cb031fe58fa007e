//! Recognizer lifecycle management.
//!
//! One mutex-guarded optional slot holds the single live recognizer. The
//! same lock covers construction and every transcription call: the worker is
//! not verified safe for concurrent invocation, so inference stays serialized
//! behind the slot on purpose.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::Result;
use crate::recognizer::{Recognizer, RecognizerFactory, Segment};

pub struct ModelManager {
    factory: Box<dyn RecognizerFactory>,
    slot: Arc<Mutex<Option<Arc<dyn Recognizer>>>>,
}

impl ModelManager {
    pub fn new(factory: impl RecognizerFactory) -> Self {
        Self {
            factory: Box::new(factory),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Eagerly build the recognizer so the first request does not pay the
    /// multi-second construction cost. A failure here leaves the slot empty;
    /// later calls retry construction from scratch.
    pub async fn warm(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if slot.is_none() {
            info!("loading recognizer");
            *slot = Some(self.factory.build()?);
            info!("recognizer loaded");
        }
        Ok(())
    }

    /// Transcribe through the current recognizer, building one first if the
    /// slot is empty. The slot lock is held across the whole call; it moves
    /// into the blocking task so exclusivity holds even if the caller is
    /// cancelled while the transcription is still running.
    pub async fn transcribe(&self, input: &str) -> Result<Vec<Segment>> {
        let mut slot = Arc::clone(&self.slot).lock_owned().await;
        let recognizer = match slot.as_ref() {
            Some(recognizer) => Arc::clone(recognizer),
            None => {
                info!("no live recognizer, building one");
                let built = self.factory.build()?;
                *slot = Some(Arc::clone(&built));
                built
            }
        };

        let input = input.to_string();
        tokio::task::spawn_blocking(move || {
            let _slot = slot;
            recognizer.transcribe(&input)
        })
        .await
        .map_err(|e| crate::error::Error::Inference(format!("transcription task failed: {e}")))?
    }

    /// Discard the current recognizer so the next call rebuilds. Idempotent;
    /// an in-flight call on the old handle finishes naturally through its
    /// own reference.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if slot.take().is_some() {
            warn!("discarding recognizer after fatal fault");
        }
    }
}
