//! Liveness endpoint.

use axum::Json;
use serde_json::json;

/// Always reports ok, even while the recognizer is absent or mid-rebuild.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
