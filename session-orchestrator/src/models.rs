//! Session records and the workspace specification handed to provisioners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

pub type Metadata = BTreeMap<String, Value>;

/// Metadata key set when a record is served by the stub provisioner.
pub const STUB_MODE_KEY: &str = "stub_mode";
/// Metadata key set when the stub provisioner terminated the record.
pub const STUB_TERMINATED_KEY: &str = "stub_terminated";
/// Metadata key set when a live sandbox started but no tunnel URL was found.
pub const MISSING_URL_KEY: &str = "missing_modal_url";
/// Metadata key holding the launch failure reason of a failed record.
pub const FAILURE_REASON_KEY: &str = "failure_reason";
/// Metadata key holding the reason of the last failed stop attempt.
pub const TERMINATION_ERROR_KEY: &str = "termination_error";
/// Metadata key holding the platform-assigned id of a live sandbox.
pub const SANDBOX_HANDLE_KEY: &str = "sandbox_handle";
/// Metadata key holding the public host of the notebook tunnel.
pub const TUNNEL_HOST_KEY: &str = "tunnel_host";

/// Lifecycle states of a session.
///
/// ```text
/// pending -> provisioning -> running -> terminated
///                         \-> failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Provisioning,
    Running,
    Terminated,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Provisioning => "provisioning",
            SessionStatus::Running => "running",
            SessionStatus::Terminated => "terminated",
            SessionStatus::Failed => "failed",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Terminated | SessionStatus::Failed)
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Pending, Provisioning)
                | (Provisioning, Running)
                | (Provisioning, Failed)
                | (Running, Terminated)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a provisioner needs to launch one workspace session.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceSpec {
    workspace_id: String,
    #[serde(skip_serializing)]
    token: String,
    entrypoint_filename: String,
    requirements: Vec<String>,
    env: BTreeMap<String, String>,
    metadata: Metadata,
}

impl WorkspaceSpec {
    /// `workspace_path` is merged into the caller metadata under `workspace_path`.
    pub fn new(
        workspace_id: impl Into<String>,
        token: impl Into<String>,
        entrypoint_filename: impl Into<String>,
        requirements: Vec<String>,
        env: BTreeMap<String, String>,
        mut metadata: Metadata,
        workspace_path: &std::path::Path,
    ) -> Self {
        metadata.insert(
            "workspace_path".to_string(),
            Value::String(workspace_path.display().to_string()),
        );
        Self {
            workspace_id: workspace_id.into(),
            token: token.into(),
            entrypoint_filename: entrypoint_filename.into(),
            requirements,
            env,
            metadata,
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn entrypoint_filename(&self) -> &str {
        &self.entrypoint_filename
    }

    pub fn requirements(&self) -> &[String] {
        &self.requirements
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// The registry's view of one session.
///
/// Callers outside this crate only ever see clones. The registry copy changes
/// through the `mark_*` methods, which are reachable from the manager and the
/// provisioners only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub workspace_id: String,
    pub sandbox_id: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub url: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SessionRecord {
    /// A pending record with a locally generated placeholder sandbox id.
    pub fn new(workspace_id: impl Into<String>, token: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            workspace_id: workspace_id.into(),
            sandbox_id: Uuid::new_v4().simple().to_string(),
            token: token.into(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Pending,
            url: None,
            metadata: Metadata::new(),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.metadata.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.metadata.get(FAILURE_REASON_KEY).and_then(Value::as_str)
    }

    pub(crate) fn set_flag(&mut self, key: &str) {
        self.metadata.insert(key.to_string(), Value::Bool(true));
    }

    pub(crate) fn set_meta(&mut self, key: &str, value: impl Into<Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub(crate) fn mark_provisioning(&mut self) {
        self.transition(SessionStatus::Provisioning);
    }

    pub(crate) fn mark_running(&mut self, url: String) {
        self.transition(SessionStatus::Running);
        self.url = Some(url);
    }

    pub(crate) fn mark_failed(&mut self, reason: String) {
        self.transition(SessionStatus::Failed);
        self.url = None;
        self.metadata
            .insert(FAILURE_REASON_KEY.to_string(), Value::String(reason));
    }

    pub(crate) fn mark_terminated(&mut self) {
        self.transition(SessionStatus::Terminated);
        self.url = None;
        self.metadata.remove(TERMINATION_ERROR_KEY);
    }

    /// Records a failed stop attempt without touching the status.
    pub(crate) fn note_termination_failure(&mut self, reason: String) {
        self.metadata
            .insert(TERMINATION_ERROR_KEY.to_string(), Value::String(reason));
        self.updated_at = Utc::now();
    }

    fn transition(&mut self, next: SessionStatus) {
        debug_assert!(
            self.status.can_transition_to(next),
            "illegal session transition {} -> {}",
            self.status,
            next
        );
        self.status = next;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_pending_without_url() {
        let record = SessionRecord::new("ws1", "secret-token");
        assert_eq!(record.status, SessionStatus::Pending);
        assert!(record.url.is_none());
        assert_eq!(record.sandbox_id.len(), 32);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut record = SessionRecord::new("ws1", "secret-token");
        record.mark_provisioning();
        assert_eq!(record.status, SessionStatus::Provisioning);

        record.mark_running("http://localhost:8866/workspaces/x".to_string());
        assert_eq!(record.status, SessionStatus::Running);
        assert!(record.url.is_some());

        record.mark_terminated();
        assert_eq!(record.status, SessionStatus::Terminated);
        assert!(record.url.is_none());
        assert!(record.updated_at >= record.created_at);
    }

    #[test]
    fn test_failed_records_reason() {
        let mut record = SessionRecord::new("ws1", "secret-token");
        record.mark_provisioning();
        record.mark_failed("boom".to_string());

        assert_eq!(record.status, SessionStatus::Failed);
        assert_eq!(record.failure_reason(), Some("boom"));
        assert!(record.url.is_none());
    }

    #[test]
    fn test_terminal_states_allow_no_transition() {
        use SessionStatus::*;
        let all = [Pending, Provisioning, Running, Terminated, Failed];
        for next in all {
            assert!(!Terminated.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
        assert!(!Pending.can_transition_to(Running));
        assert!(!Running.can_transition_to(Failed));
    }

    #[test]
    fn test_termination_failure_keeps_status() {
        let mut record = SessionRecord::new("ws1", "secret-token");
        record.mark_provisioning();
        record.mark_running("https://example.test".to_string());
        record.note_termination_failure("timeout".to_string());

        assert_eq!(record.status, SessionStatus::Running);
        assert_eq!(
            record.metadata.get(TERMINATION_ERROR_KEY),
            Some(&Value::String("timeout".to_string()))
        );

        record.mark_terminated();
        assert!(!record.metadata.contains_key(TERMINATION_ERROR_KEY));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Provisioning).unwrap();
        assert_eq!(json, "\"provisioning\"");
    }

    #[test]
    fn test_spec_merges_workspace_path() {
        let spec = WorkspaceSpec::new(
            "ws1",
            "tok",
            "main.py",
            vec![],
            BTreeMap::new(),
            Metadata::new(),
            std::path::Path::new("/tmp/ws1"),
        );
        assert_eq!(
            spec.metadata().get("workspace_path"),
            Some(&Value::String("/tmp/ws1".to_string()))
        );
    }
}
