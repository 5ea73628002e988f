use super::{build_stub_url, SessionProvisioner};
use crate::error::Result;
use crate::models::{SessionRecord, WorkspaceSpec, STUB_MODE_KEY, STUB_TERMINATED_KEY};
use async_trait::async_trait;
use tracing::info;

/// Serves sessions from a local placeholder endpoint without any sandbox.
#[derive(Debug, Clone)]
pub struct StubProvisioner {
    local_host: String,
}

impl StubProvisioner {
    pub fn new(local_host: impl Into<String>) -> Self {
        Self {
            local_host: local_host.into(),
        }
    }
}

#[async_trait]
impl SessionProvisioner for StubProvisioner {
    fn mode(&self) -> &'static str {
        "stub"
    }

    async fn launch_session(&self, spec: &WorkspaceSpec, record: &mut SessionRecord) -> Result<()> {
        record.mark_provisioning();

        let url = build_stub_url(&self.local_host, &record.sandbox_id);
        record.set_flag(STUB_MODE_KEY);
        record.mark_running(url);

        info!(
            workspace_id = spec.workspace_id(),
            sandbox_id = %record.sandbox_id,
            "Stub session running"
        );
        Ok(())
    }

    async fn stop_session(&self, record: &mut SessionRecord) -> Result<()> {
        record.mark_terminated();
        record.set_flag(STUB_TERMINATED_KEY);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, SessionStatus};
    use std::collections::BTreeMap;
    use std::path::Path;

    #[tokio::test]
    async fn test_stub_launch_and_stop() {
        let provisioner = StubProvisioner::new("http://localhost:8866");
        let spec = WorkspaceSpec::new(
            "ws1",
            "token123",
            "main.py",
            vec![],
            BTreeMap::new(),
            Metadata::new(),
            Path::new("/tmp/ws1"),
        );
        let mut record = SessionRecord::new("ws1", "token123");

        provisioner.launch_session(&spec, &mut record).await.unwrap();
        assert_eq!(record.status, SessionStatus::Running);
        assert!(record.flag(STUB_MODE_KEY));
        assert_eq!(
            record.url.as_deref(),
            Some(format!("http://localhost:8866/workspaces/{}", record.sandbox_id).as_str())
        );

        provisioner.stop_session(&mut record).await.unwrap();
        assert_eq!(record.status, SessionStatus::Terminated);
        assert!(record.flag(STUB_TERMINATED_KEY));
        assert!(record.url.is_none());
    }
}
