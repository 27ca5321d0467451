use axum::{
    extract::{Path, State, rejection::PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::errors::AppError;
use crate::thumbnails::INVALID_IDENTIFIER_MESSAGE;
use crate::web::{
    AppState,
    responses::{handle_error, png_response},
};

/// `GET /thumb/{id}.png`
///
/// Always answers with a PNG unless the identifier is invalid. Placeholders
/// carry no `Cache-Control` so clients retry once upstream recovers.
pub async fn get_thumbnail(
    State(state): State<AppState>,
    file: Result<Path<String>, PathRejection>,
) -> Response {
    // a segment that does not percent-decode to UTF-8 cannot be an identifier
    let Ok(Path(file)) = file else {
        return handle_error(AppError::validation(INVALID_IDENTIFIER_MESSAGE));
    };
    let Some(raw_id) = file.strip_suffix(".png") else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.thumbnails.get_thumbnail(raw_id).await {
        Ok(outcome) => {
            debug!("Thumbnail request resolved as {}", outcome.label());
            let cache_control = outcome
                .is_cacheable()
                .then(|| state.config.cache_control_header());
            png_response(outcome.into_bytes(), cache_control.as_deref())
        }
        Err(e) => handle_error(e),
    }
}
