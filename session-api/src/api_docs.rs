use crate::routes::health::HealthResponse;
use crate::routes::workspaces::{
    WorkspaceCreateRequest, WorkspaceResponse, WorkspaceStatusResponse, WorkspaceTerminateResponse,
};
use session_orchestrator::SessionStatus;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::health::health_check,
        crate::routes::workspaces::list_workspaces,
        crate::routes::workspaces::create_workspace,
        crate::routes::workspaces::get_workspace,
        crate::routes::workspaces::terminate_workspace,
    ),
    components(
        schemas(
            HealthResponse,
            SessionStatus,
            WorkspaceCreateRequest,
            WorkspaceResponse,
            WorkspaceStatusResponse,
            WorkspaceTerminateResponse
        )
    ),
    tags(
        (name = "session-api", description = "Notebook Session Orchestration API")
    )
)]
pub struct ApiDoc;
