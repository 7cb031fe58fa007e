//! Shared application state.

use hark_core::ModelManager;
use std::sync::Arc;

/// Cloneable handle to the single recognizer lifecycle manager.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ModelManager>,
}

impl AppState {
    pub fn new(manager: ModelManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}
