use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// `stub` or `live`.
    pub provisioner: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "session-api",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "session-orchestrator".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provisioner: state.manager.provisioner_mode().to_string(),
    })
}
