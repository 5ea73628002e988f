//! Test doubles shared by unit tests, integration tests and the HTTP crate.

use crate::config::Settings;
use crate::error::{OrchestratorError, Result};
use crate::manager::SessionManager;
use crate::models::{Metadata, SessionRecord, WorkspaceSpec};
use crate::platform::{SandboxHandle, SandboxPlatform, SandboxRequest, Tunnel, VolumeRef};
use crate::provisioner::{SessionProvisioner, StubProvisioner, NOTEBOOK_PORT};
use crate::storage::{LocalWorkspaceStorage, WorkspaceStorage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A manager backed by local storage under `root` and the stub provisioner.
pub fn stub_manager(root: &Path) -> SessionManager {
    let settings = Settings::local(root);
    let storage = LocalWorkspaceStorage::new(root).expect("Failed to create test storage");
    let provisioner = StubProvisioner::new(settings.local_sandbox_host.clone());
    SessionManager::new(settings, Arc::new(storage), Arc::new(provisioner))
}

/// Like [`stub_manager`] but with a caller-supplied provisioner.
pub fn manager_with(root: &Path, provisioner: Arc<dyn SessionProvisioner>) -> SessionManager {
    let storage = LocalWorkspaceStorage::new(root).expect("Failed to create test storage");
    SessionManager::new(Settings::local(root), Arc::new(storage), provisioner)
}

#[derive(Default)]
struct ScriptedState {
    next_id: usize,
    submitted: Vec<SandboxRequest>,
    terminated: Vec<String>,
}

/// In-memory sandbox platform with scripted failures.
#[derive(Default)]
pub struct ScriptedPlatform {
    tunnel: Option<Tunnel>,
    tunnels_fail: bool,
    create_error: Option<String>,
    terminate_error: Option<String>,
    state: Mutex<ScriptedState>,
}

impl ScriptedPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `tunnel` for the notebook port of every sandbox.
    pub fn with_tunnel(mut self, tunnel: Tunnel) -> Self {
        self.tunnel = Some(tunnel);
        self
    }

    pub fn failing_tunnels(mut self) -> Self {
        self.tunnels_fail = true;
        self
    }

    pub fn failing_create(mut self, message: &str) -> Self {
        self.create_error = Some(message.to_string());
        self
    }

    pub fn failing_terminate(mut self, message: &str) -> Self {
        self.terminate_error = Some(message.to_string());
        self
    }

    pub fn submitted(&self) -> Vec<SandboxRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn terminated(&self) -> Vec<String> {
        self.state.lock().unwrap().terminated.clone()
    }
}

#[async_trait]
impl SandboxPlatform for ScriptedPlatform {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn lookup_volume(&self, name: &str) -> anyhow::Result<VolumeRef> {
        Ok(VolumeRef {
            volume_id: format!("vol-{name}"),
            name: name.to_string(),
        })
    }

    async fn create_sandbox(&self, request: &SandboxRequest) -> anyhow::Result<SandboxHandle> {
        if let Some(message) = &self.create_error {
            anyhow::bail!("{message}");
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.submitted.push(request.clone());
        Ok(SandboxHandle {
            sandbox_id: format!("sb-{}", state.next_id),
        })
    }

    async fn tunnels(&self, _sandbox_id: &str) -> anyhow::Result<HashMap<u16, Tunnel>> {
        if self.tunnels_fail {
            anyhow::bail!("tunnel lookup unavailable");
        }
        Ok(self
            .tunnel
            .iter()
            .map(|tunnel| (NOTEBOOK_PORT, tunnel.clone()))
            .collect())
    }

    async fn terminate(&self, sandbox_id: &str) -> anyhow::Result<()> {
        if let Some(message) = &self.terminate_error {
            anyhow::bail!("{message}");
        }
        self.state
            .lock()
            .unwrap()
            .terminated
            .push(sandbox_id.to_string());
        Ok(())
    }
}

/// Stub provisioner that counts calls and can be told to fail or stall.
pub struct RecordingProvisioner {
    inner: StubProvisioner,
    launches: AtomicUsize,
    stops: AtomicUsize,
    fail_launch: bool,
    fail_stop: bool,
    delay: Option<Duration>,
    stop_delay: Option<Duration>,
}

impl RecordingProvisioner {
    pub fn stub() -> Self {
        Self {
            inner: StubProvisioner::new("http://localhost:8866"),
            launches: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            fail_launch: false,
            fail_stop: false,
            delay: None,
            stop_delay: None,
        }
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn failing_stop(mut self) -> Self {
        self.fail_stop = true;
        self
    }

    /// Sleep this long inside every launch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep this long inside every stop.
    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = Some(delay);
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvisioner for RecordingProvisioner {
    fn mode(&self) -> &'static str {
        "stub"
    }

    async fn launch_session(&self, spec: &WorkspaceSpec, record: &mut SessionRecord) -> Result<()> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_launch {
            record.mark_provisioning();
            record.mark_failed("sandbox quota exceeded".to_string());
            return Err(OrchestratorError::provisioning(
                "Sandbox launch failed",
                anyhow::anyhow!("sandbox quota exceeded"),
            ));
        }
        self.inner.launch_session(spec, record).await
    }

    async fn stop_session(&self, record: &mut SessionRecord) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.stop_delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_stop {
            return Err(OrchestratorError::provisioning(
                "Failed to stop sandbox",
                anyhow::anyhow!("gateway timeout"),
            ));
        }
        self.inner.stop_session(record).await
    }
}

/// Local storage whose metadata writes always fail.
pub struct FailingStorage {
    inner: LocalWorkspaceStorage,
}

impl FailingStorage {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalWorkspaceStorage::new(root).expect("Failed to create test storage"),
        }
    }
}

impl WorkspaceStorage for FailingStorage {
    fn ensure_workspace(&self, workspace_id: &str) -> Result<PathBuf> {
        self.inner.ensure_workspace(workspace_id)
    }

    fn persist_requirements(&self, workspace_id: &str, requirements: &[String]) -> Result<PathBuf> {
        self.inner.persist_requirements(workspace_id, requirements)
    }

    fn persist_metadata(&self, _workspace_id: &str, _metadata: &Metadata) -> Result<PathBuf> {
        Err(OrchestratorError::storage(
            "Failed to write workspace metadata",
            std::io::Error::other("disk full"),
        ))
    }
}
