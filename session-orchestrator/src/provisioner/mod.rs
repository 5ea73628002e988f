//! Provisioning clients: turn a [`WorkspaceSpec`] into a reachable session.
//!
//! The client is picked once at startup. Without a configured sandbox
//! platform every session is served by [`StubProvisioner`]; otherwise
//! [`SandboxProvisioner`] drives the platform.

mod sandbox;
mod startup;
mod stub;

pub use sandbox::SandboxProvisioner;
pub use startup::{render_startup_script, CACHE_MOUNT, DATA_MOUNT, NOTEBOOK_PORT};
pub use stub::StubProvisioner;

use crate::config::Settings;
use crate::error::{OrchestratorError, Result};
use crate::models::{SessionRecord, WorkspaceSpec};
use crate::platform::HttpSandboxPlatform;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[async_trait]
pub trait SessionProvisioner: Send + Sync {
    /// `"stub"` or `"live"`.
    fn mode(&self) -> &'static str;

    /// Drive a pending `record` through provisioning.
    ///
    /// On success the record is `running` with a URL. On failure it is
    /// `failed` with its reason recorded, and a provisioning error is returned.
    async fn launch_session(&self, spec: &WorkspaceSpec, record: &mut SessionRecord) -> Result<()>;

    /// Stop the sandbox behind a running record and mark it `terminated`.
    ///
    /// A failed stop leaves the status unchanged.
    async fn stop_session(&self, record: &mut SessionRecord) -> Result<()>;
}

/// Placeholder endpoint used whenever no real tunnel is available.
pub fn build_stub_url(local_host: &str, sandbox_id: &str) -> String {
    format!("{}/workspaces/{}", local_host.trim_end_matches('/'), sandbox_id)
}

/// Select the provisioning client for this process.
pub fn from_settings(settings: &Settings) -> Result<Arc<dyn SessionProvisioner>> {
    match &settings.sandbox_api_url {
        Some(api_url) => {
            let platform = HttpSandboxPlatform::new(
                api_url,
                settings.sandbox_api_token.clone(),
                Duration::from_secs(settings.sandbox_request_timeout_secs),
            )
            .map_err(|e| OrchestratorError::Config(format!("{e:#}")))?;
            info!(api_url = %api_url, "Using sandbox platform provisioner");
            Ok(Arc::new(SandboxProvisioner::new(platform, settings.clone())))
        }
        None => {
            warn!("No sandbox platform configured; sessions will use stub responses");
            Ok(Arc::new(StubProvisioner::new(settings.local_sandbox_host.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_url_pattern() {
        assert_eq!(
            build_stub_url("http://localhost:8866", "abc"),
            "http://localhost:8866/workspaces/abc"
        );
        assert_eq!(
            build_stub_url("http://localhost:8866/", "abc"),
            "http://localhost:8866/workspaces/abc"
        );
    }

    #[test]
    fn test_from_settings_selects_mode() {
        let mut settings = Settings::local("/tmp/ws");
        assert_eq!(from_settings(&settings).unwrap().mode(), "stub");

        settings.sandbox_api_url = Some("https://sandbox.example".to_string());
        assert_eq!(from_settings(&settings).unwrap().mode(), "live");
    }

    #[test]
    fn test_from_settings_rejects_bad_url() {
        let mut settings = Settings::local("/tmp/ws");
        settings.sandbox_api_url = Some("::not-a-url".to_string());

        let err = from_settings(&settings).err().expect("should fail");
        assert!(matches!(err, OrchestratorError::Config(_)));
    }
}
