//! Durable storage for per-workspace metadata and dependency lists.
//!
//! Every operation is idempotent and creates the workspace directory on
//! demand. Only a local filesystem backend exists; object stores plug in by
//! implementing [`WorkspaceStorage`].

use crate::error::{OrchestratorError, Result};
use crate::models::Metadata;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File holding newline-separated dependency specifiers.
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// File holding the sorted-key workspace metadata document.
pub const METADATA_FILE: &str = "workspace.json";

pub trait WorkspaceStorage: Send + Sync {
    /// Return a writable location for the workspace, creating it if needed.
    fn ensure_workspace(&self, workspace_id: &str) -> Result<PathBuf>;

    /// Overwrite the workspace dependency list.
    fn persist_requirements(&self, workspace_id: &str, requirements: &[String]) -> Result<PathBuf>;

    /// Overwrite the workspace metadata document.
    fn persist_metadata(&self, workspace_id: &str, metadata: &Metadata) -> Result<PathBuf>;
}

/// Filesystem-backed storage rooted at a single directory.
#[derive(Debug, Clone)]
pub struct LocalWorkspaceStorage {
    root: PathBuf,
}

impl LocalWorkspaceStorage {
    /// Create the root directory (with `~` expanded) and resolve it.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let raw = root.as_ref().to_string_lossy();
        let expanded = PathBuf::from(shellexpand::tilde(&raw).into_owned());

        fs::create_dir_all(&expanded).map_err(|e| {
            OrchestratorError::storage(
                format!("Failed to create storage root {}", expanded.display()),
                e,
            )
        })?;
        let root = expanded.canonicalize().map_err(|e| {
            OrchestratorError::storage(
                format!("Failed to resolve storage root {}", expanded.display()),
                e,
            )
        })?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl WorkspaceStorage for LocalWorkspaceStorage {
    fn ensure_workspace(&self, workspace_id: &str) -> Result<PathBuf> {
        let workspace_path = self.root.join(workspace_id);
        fs::create_dir_all(&workspace_path).map_err(|e| {
            OrchestratorError::storage(
                format!("Failed to create workspace directory for {workspace_id}"),
                e,
            )
        })?;
        Ok(workspace_path)
    }

    fn persist_requirements(&self, workspace_id: &str, requirements: &[String]) -> Result<PathBuf> {
        let requirements_path = self.ensure_workspace(workspace_id)?.join(REQUIREMENTS_FILE);

        let mut content = requirements.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        fs::write(&requirements_path, content)
            .map_err(|e| OrchestratorError::storage("Failed to write requirements.txt", e))?;
        debug!(
            workspace_id,
            count = requirements.len(),
            "Persisted workspace requirements"
        );

        Ok(requirements_path)
    }

    fn persist_metadata(&self, workspace_id: &str, metadata: &Metadata) -> Result<PathBuf> {
        let metadata_path = self.ensure_workspace(workspace_id)?.join(METADATA_FILE);

        // BTreeMap keys, and serde_json::Map without preserve_order, serialize sorted.
        let document = serde_json::to_string_pretty(metadata)?;

        fs::write(&metadata_path, document)
            .map_err(|e| OrchestratorError::storage("Failed to write workspace metadata", e))?;
        debug!(workspace_id, "Persisted workspace metadata");

        Ok(metadata_path)
    }
}
