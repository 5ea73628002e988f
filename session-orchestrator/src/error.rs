use thiserror::Error;

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("No workspace found for id {0}")]
    WorkspaceNotFound(String),

    #[error("Workspace {0} already has an active session")]
    WorkspaceConflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The sandbox platform call failed during launch or stop.
    #[error("{message}: {source:#}")]
    Provisioning {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// Local workspace persistence failed.
    #[error("{message}: {source}")]
    Storage {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A detached lifecycle task panicked.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl OrchestratorError {
    pub(crate) fn provisioning(message: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Provisioning {
            message: message.into(),
            source,
        }
    }

    pub(crate) fn storage(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            message: message.into(),
            source,
        }
    }

    /// Whether the error was caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::WorkspaceNotFound(_)
                | Self::WorkspaceConflict(_)
                | Self::InvalidInput(_)
                | Self::InvalidState(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisioning_message_includes_cause() {
        let err = OrchestratorError::provisioning(
            "Sandbox launch failed",
            anyhow::anyhow!("gateway returned 503"),
        );
        assert_eq!(err.to_string(), "Sandbox launch failed: gateway returned 503");
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_not_found_is_client_error() {
        let err = OrchestratorError::WorkspaceNotFound("abc".to_string());
        assert_eq!(err.to_string(), "No workspace found for id abc");
        assert!(err.is_client_error());
    }
}
