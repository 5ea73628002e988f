//! Validation of caller-supplied identifiers before they reach the
//! filesystem or the sandbox startup procedure.

use crate::error::{OrchestratorError, Result};

pub const MAX_WORKSPACE_ID_LEN: usize = 64;

/// Workspace ids become directory names: `[A-Za-z0-9_-]{1,64}`.
pub fn validate_workspace_id(workspace_id: &str) -> Result<()> {
    if workspace_id.is_empty() || workspace_id.len() > MAX_WORKSPACE_ID_LEN {
        return Err(OrchestratorError::InvalidInput(format!(
            "Workspace id must be between 1 and {MAX_WORKSPACE_ID_LEN} characters"
        )));
    }

    if !workspace_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(OrchestratorError::InvalidInput(format!(
            "Workspace id '{workspace_id}' may only contain letters, digits, '-' and '_'"
        )));
    }

    Ok(())
}

/// The entrypoint must be a single file name inside the workspace directory.
pub fn validate_entrypoint_filename(filename: &str) -> Result<()> {
    if filename.trim().is_empty() {
        return Err(OrchestratorError::InvalidInput(
            "Entrypoint filename must not be empty".to_string(),
        ));
    }

    if filename == "." || filename == ".." || filename.contains(['/', '\\']) {
        return Err(OrchestratorError::InvalidInput(format!(
            "Entrypoint filename '{filename}' must be a plain file name"
        )));
    }

    if filename.chars().any(|c| c.is_control()) {
        return Err(OrchestratorError::InvalidInput(
            "Entrypoint filename contains control characters".to_string(),
        ));
    }

    Ok(())
}
