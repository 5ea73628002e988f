use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use session_orchestrator::OrchestratorError;
use thiserror::Error;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::WorkspaceNotFound(_) => ApiError::NotFound(err.to_string()),
            OrchestratorError::InvalidInput(msg) => ApiError::BadRequest(msg),
            OrchestratorError::WorkspaceConflict(_) | OrchestratorError::InvalidState(_) => {
                ApiError::Conflict(err.to_string())
            }
            _ => {
                error!("Request failed: {err}");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_error_mapping() {
        let cases = [
            (
                OrchestratorError::WorkspaceNotFound("ws1".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                OrchestratorError::InvalidInput("bad id".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                OrchestratorError::WorkspaceConflict("ws1".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                OrchestratorError::InvalidState("failed".to_string()),
                StatusCode::CONFLICT,
            ),
            (
                OrchestratorError::Config("bad url".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_not_found_message_names_workspace() {
        let err = ApiError::from(OrchestratorError::WorkspaceNotFound("ws1".to_string()));
        assert_eq!(err.to_string(), "No workspace found for id ws1");
    }
}
