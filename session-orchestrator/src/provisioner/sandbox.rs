use super::startup::{render_startup_script, CACHE_MOUNT, DATA_MOUNT, NOTEBOOK_PORT};
use super::{build_stub_url, SessionProvisioner};
use crate::config::Settings;
use crate::error::{OrchestratorError, Result};
use crate::models::{
    SessionRecord, WorkspaceSpec, MISSING_URL_KEY, SANDBOX_HANDLE_KEY, TUNNEL_HOST_KEY,
};
use crate::platform::{ImageSpec, SandboxPlatform, SandboxRequest};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};

/// Launches sessions as isolated sandboxes on an external platform.
pub struct SandboxProvisioner<P> {
    platform: P,
    settings: Settings,
}

impl<P: SandboxPlatform> SandboxProvisioner<P> {
    pub fn new(platform: P, settings: Settings) -> Self {
        Self { platform, settings }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    async fn build_request(&self, spec: &WorkspaceSpec) -> anyhow::Result<SandboxRequest> {
        let mut volumes = BTreeMap::new();
        if !self.settings.volume_notebooks.is_empty() {
            let volume = self.platform.lookup_volume(&self.settings.volume_notebooks).await?;
            volumes.insert(DATA_MOUNT.to_string(), volume);
        }
        if !self.settings.volume_cache.is_empty() {
            let volume = self.platform.lookup_volume(&self.settings.volume_cache).await?;
            volumes.insert(CACHE_MOUNT.to_string(), volume);
        }

        let script = render_startup_script(spec).context("Failed to render startup script")?;

        let mut metadata = spec.metadata().clone();
        metadata.insert(
            "workspace_id".to_string(),
            Value::String(spec.workspace_id().to_string()),
        );

        Ok(SandboxRequest {
            app: self.settings.sandbox_app_name.clone(),
            command: vec!["sh".to_string(), "-c".to_string(), script],
            image: ImageSpec::notebook(),
            volumes,
            env: spec.env().clone(),
            timeout_secs: self.settings.sandbox_timeout_secs,
            encrypted_ports: vec![NOTEBOOK_PORT],
            metadata,
        })
    }

    /// Public URL of the notebook port, if the platform reports one.
    async fn tunnel_url(&self, record: &mut SessionRecord) -> Option<String> {
        let tunnels = match self.platform.tunnels(&record.sandbox_id).await {
            Ok(tunnels) => tunnels,
            Err(e) => {
                warn!(sandbox_id = %record.sandbox_id, "Failed to extract tunnel URL: {e:#}");
                return None;
            }
        };

        let tunnel = tunnels.get(&NOTEBOOK_PORT).filter(|t| !t.host.is_empty())?;
        record.set_meta(TUNNEL_HOST_KEY, tunnel.host.clone());
        Some(tunnel.url())
    }

    async fn submit(&self, spec: &WorkspaceSpec, record: &mut SessionRecord) -> anyhow::Result<()> {
        let request = self.build_request(spec).await?;
        let handle = self.platform.create_sandbox(&request).await?;

        record.sandbox_id = handle.sandbox_id.clone();
        record.set_meta(SANDBOX_HANDLE_KEY, handle.sandbox_id);

        let url = match self.tunnel_url(record).await {
            Some(url) => url,
            None => {
                warn!(
                    workspace_id = spec.workspace_id(),
                    sandbox_id = %record.sandbox_id,
                    "Sandbox started without a tunnel; falling back to stub URL"
                );
                record.set_flag(MISSING_URL_KEY);
                build_stub_url(&self.settings.local_sandbox_host, &record.sandbox_id)
            }
        };

        record.mark_running(url);
        Ok(())
    }
}

#[async_trait]
impl<P: SandboxPlatform> SessionProvisioner for SandboxProvisioner<P> {
    fn mode(&self) -> &'static str {
        "live"
    }

    #[instrument(skip_all, fields(workspace_id = spec.workspace_id(), platform = self.platform.name()))]
    async fn launch_session(&self, spec: &WorkspaceSpec, record: &mut SessionRecord) -> Result<()> {
        record.mark_provisioning();

        match self.submit(spec, record).await {
            Ok(()) => {
                info!(sandbox_id = %record.sandbox_id, "Sandbox running");
                Ok(())
            }
            Err(e) => {
                record.mark_failed(format!("{e:#}"));
                error!("Failed to launch sandbox for {}: {e:#}", spec.workspace_id());
                Err(OrchestratorError::provisioning("Sandbox launch failed", e))
            }
        }
    }

    #[instrument(skip_all, fields(sandbox_id = %record.sandbox_id))]
    async fn stop_session(&self, record: &mut SessionRecord) -> Result<()> {
        if let Err(e) = self.platform.terminate(&record.sandbox_id).await {
            error!("Failed to stop sandbox {}: {e:#}", record.sandbox_id);
            return Err(OrchestratorError::provisioning("Failed to stop sandbox", e));
        }

        record.mark_terminated();
        info!("Sandbox terminated");
        Ok(())
    }
}
