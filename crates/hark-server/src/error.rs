//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error type. Rendered as the service's fixed failure shape:
/// `{"code": 1, "error": <message>}` with the carried status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "code": 1,
            "error": self.message,
        }));
        (self.status, body).into_response()
    }
}

impl From<hark_core::Error> for ApiError {
    fn from(err: hark_core::Error) -> Self {
        ApiError::internal(err.to_string())
    }
}
