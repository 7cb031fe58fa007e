//! API routes and handlers

mod asr;
mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Liveness only; never consults the model
        .route("/health", get(health::health_check))
        // Transcription from an uploaded file
        .route("/asr", post(asr::recognize_upload))
        // Transcription from a remote URL the worker fetches itself
        .route("/asr/url", post(asr::recognize_url))
        // Audio uploads routinely exceed axum's 2 MB default body cap
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
