//! The external sandbox platform, consumed as an opaque capability:
//! launch an isolated process exposing one port, report its tunnels, stop it.

mod http;

pub use http::HttpSandboxPlatform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::models::Metadata;

/// A durable named volume on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    pub volume_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    pub base: String,
    pub python_packages: Vec<String>,
}

impl ImageSpec {
    /// Slim Debian with the notebook server and the uv installer.
    pub fn notebook() -> Self {
        Self {
            base: "debian-slim".to_string(),
            python_packages: vec!["marimo".to_string(), "uv".to_string()],
        }
    }
}

/// One isolated process submission.
#[derive(Debug, Clone, Serialize)]
pub struct SandboxRequest {
    pub app: String,
    pub command: Vec<String>,
    pub image: ImageSpec,
    /// Mount path to volume.
    pub volumes: BTreeMap<String, VolumeRef>,
    pub env: BTreeMap<String, String>,
    pub timeout_secs: u64,
    pub encrypted_ports: Vec<u16>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SandboxHandle {
    pub sandbox_id: String,
}

/// Externally reachable address of a sandbox port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    pub host: String,
    #[serde(default = "default_tunnel_port")]
    pub port: u16,
}

fn default_tunnel_port() -> u16 {
    443
}

impl Tunnel {
    pub fn url(&self) -> String {
        if self.port == 443 {
            format!("https://{}", self.host)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }
}

#[async_trait]
pub trait SandboxPlatform: Send + Sync {
    /// Platform name used in logs.
    fn name(&self) -> &'static str;

    /// Resolve a named volume, creating it when missing.
    async fn lookup_volume(&self, name: &str) -> anyhow::Result<VolumeRef>;

    async fn create_sandbox(&self, request: &SandboxRequest) -> anyhow::Result<SandboxHandle>;

    /// Tunnels of a running sandbox, keyed by internal port.
    async fn tunnels(&self, sandbox_id: &str) -> anyhow::Result<HashMap<u16, Tunnel>>;

    async fn terminate(&self, sandbox_id: &str) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_url_omits_default_port() {
        let tunnel = Tunnel {
            host: "abc.tunnels.example".to_string(),
            port: 443,
        };
        assert_eq!(tunnel.url(), "https://abc.tunnels.example");
    }

    #[test]
    fn test_tunnel_url_keeps_custom_port() {
        let tunnel = Tunnel {
            host: "abc.tunnels.example".to_string(),
            port: 8443,
        };
        assert_eq!(tunnel.url(), "https://abc.tunnels.example:8443");
    }

    #[test]
    fn test_tunnel_port_defaults_to_443() {
        let tunnel: Tunnel = serde_json::from_str(r#"{"host": "h.example"}"#).unwrap();
        assert_eq!(tunnel.port, 443);
    }
}
