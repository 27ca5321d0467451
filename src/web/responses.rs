//! HTTP response types and utilities
//!
//! JSON bodies use the `{"ok": ..}` envelope; thumbnails are raw PNG bodies.

use axum::{
    Json,
    body::Bytes,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::AppError;

/// Error body returned for rejected requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            ok: false,
            error: message.into(),
        }
    }
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let (status, message) = match &error {
        AppError::Validation { message } => (StatusCode::BAD_REQUEST, message.clone()),
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Configuration error: {}", message),
        ),
        AppError::Http(_) => (
            StatusCode::BAD_GATEWAY,
            "External service communication failed".to_string(),
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal error: {}", message),
        ),
    };

    if status.is_server_error() {
        error!("Request failed: {}", error);
    }

    (status, Json(ErrorResponse::new(message))).into_response()
}

/// 200 `image/png` response, with `Cache-Control` only when given
pub fn png_response(bytes: Bytes, cache_control: Option<&str>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
    if let Some(value) = cache_control
        && let Ok(value) = HeaderValue::from_str(value)
    {
        headers.insert(CACHE_CONTROL, value);
    }

    (StatusCode::OK, headers, bytes).into_response()
}
