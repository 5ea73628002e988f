use crate::{error::ApiResult, state::AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use session_orchestrator::{CreateSessionRequest, SessionRecord, SessionStatus};
use std::collections::BTreeMap;
use utoipa::ToSchema;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route(
            "/workspaces/{id}",
            get(get_workspace).delete(terminate_workspace),
        )
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceCreateRequest {
    /// Generated when omitted.
    pub workspace_id: Option<String>,
    /// Notebook file to open, `main.py` unless configured otherwise.
    pub notebook_filename: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, Value>,
}

impl From<WorkspaceCreateRequest> for CreateSessionRequest {
    fn from(req: WorkspaceCreateRequest) -> Self {
        Self {
            workspace_id: req.workspace_id,
            requirements: req.requirements,
            env: req.env,
            metadata: req.metadata,
            entrypoint_filename: req.notebook_filename,
        }
    }
}

/// A newly created session, including its access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceResponse {
    pub workspace_id: String,
    pub sandbox_id: String,
    pub url: Option<String>,
    pub token: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, Value>,
}

impl From<SessionRecord> for WorkspaceResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            workspace_id: record.workspace_id,
            sandbox_id: record.sandbox_id,
            url: record.url,
            token: record.token,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
            metadata: record.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceStatusResponse {
    pub workspace_id: String,
    pub status: SessionStatus,
    pub url: Option<String>,
    #[schema(value_type = Object)]
    pub metadata: BTreeMap<String, Value>,
}

impl From<SessionRecord> for WorkspaceStatusResponse {
    fn from(record: SessionRecord) -> Self {
        Self {
            workspace_id: record.workspace_id,
            status: record.status,
            url: record.url,
            metadata: record.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceTerminateResponse {
    pub workspace_id: String,
    pub status: SessionStatus,
    pub terminated: bool,
}

#[utoipa::path(
    post,
    path = "/workspaces",
    tag = "session-api",
    request_body = WorkspaceCreateRequest,
    responses(
        (status = 200, description = "Session running", body = WorkspaceResponse),
        (status = 400, description = "Invalid workspace id or notebook filename"),
        (status = 409, description = "Workspace already has an active session"),
        (status = 500, description = "Storage or provisioning failure")
    )
)]
pub async fn create_workspace(
    State(state): State<AppState>,
    Json(req): Json<WorkspaceCreateRequest>,
) -> ApiResult<Json<WorkspaceResponse>> {
    let record = state.manager.create_session(req.into()).await?;

    Ok(Json(record.into()))
}

#[utoipa::path(
    get,
    path = "/workspaces",
    tag = "session-api",
    responses((status = 200, description = "All known sessions", body = [WorkspaceStatusResponse]))
)]
pub async fn list_workspaces(State(state): State<AppState>) -> Json<Vec<WorkspaceStatusResponse>> {
    let sessions = state
        .manager
        .list_sessions()
        .into_values()
        .map(WorkspaceStatusResponse::from)
        .collect();

    Json(sessions)
}

#[utoipa::path(
    get,
    path = "/workspaces/{id}",
    tag = "session-api",
    params(("id" = String, Path, description = "Workspace id")),
    responses(
        (status = 200, description = "Session status", body = WorkspaceStatusResponse),
        (status = 404, description = "Unknown workspace")
    )
)]
pub async fn get_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkspaceStatusResponse>> {
    let record = state.manager.get_session(&id)?;

    Ok(Json(record.into()))
}

#[utoipa::path(
    delete,
    path = "/workspaces/{id}",
    tag = "session-api",
    params(("id" = String, Path, description = "Workspace id")),
    responses(
        (status = 200, description = "Session terminated", body = WorkspaceTerminateResponse),
        (status = 404, description = "Unknown workspace"),
        (status = 409, description = "Session cannot be terminated"),
        (status = 500, description = "Sandbox stop failed")
    )
)]
pub async fn terminate_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<WorkspaceTerminateResponse>> {
    let record = state.manager.terminate_session(&id).await?;

    Ok(Json(WorkspaceTerminateResponse {
        terminated: record.status == SessionStatus::Terminated,
        workspace_id: record.workspace_id,
        status: record.status,
    }))
}
