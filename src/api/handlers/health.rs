use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub files: usize,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, files) = match state.upload_service.count().await {
        Ok(count) => ("ok", count),
        Err(_) => ("degraded", 0),
    };

    Json(HealthResponse {
        status: status.to_string(),
        files,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
