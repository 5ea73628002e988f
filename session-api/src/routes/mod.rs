pub mod health;
pub mod workspaces;

use crate::{api_docs::ApiDoc, state::AppState};
use axum::{routing::get, Json, Router};
use session_orchestrator::SessionManager;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

pub fn create_app(manager: SessionManager) -> Router {
    let state = AppState::new(manager);

    // Browser clients are served from other origins
    let cors = CorsLayer::permissive();

    Router::new()
        .merge(health::routes())
        .merge(workspaces::routes())
        .route("/api-docs/openapi.json", get(openapi_spec))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
