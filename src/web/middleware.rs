//! Request logging middleware

use axum::{
    extract::Request,
    http::{Method, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Log every request with its status and duration, at `warn` for 4xx/5xx
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    debug!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        "HTTP request started"
    );

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if status >= 400 {
        warn!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    response
}
