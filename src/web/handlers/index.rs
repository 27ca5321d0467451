use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::web::AppState;

/// Service descriptor returned by `GET /`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub ok: bool,
    pub service: String,
    pub size: u32,
}

pub async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        ok: true,
        service: state.config.web.service_name.clone(),
        size: state.thumbnails.size(),
    })
}
