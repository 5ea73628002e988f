use super::{SandboxHandle, SandboxPlatform, SandboxRequest, Tunnel, VolumeRef};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Sandbox platform reached through its REST gateway.
///
/// Endpoints, relative to the configured base URL:
///
/// * `POST v1/volumes/lookup` - resolve or create a named volume
/// * `POST v1/sandboxes` - submit an isolated process
/// * `GET v1/sandboxes/{id}/tunnels` - tunnels keyed by internal port
/// * `POST v1/sandboxes/{id}/terminate` - stop a sandbox
pub struct HttpSandboxPlatform {
    client: Client,
    base_url: Url,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TunnelsResponse {
    #[serde(default)]
    tunnels: HashMap<u16, Tunnel>,
}

impl HttpSandboxPlatform {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid sandbox API URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Sandbox API URL cannot be used as a base: {base_url}");
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("session-orchestrator/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("Sandbox API URL cannot be used as a base: {}", self.base_url))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, action: &str) -> Result<Response> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .with_context(|| format!("Failed to send {action} request to sandbox platform"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Sandbox platform rejected {action}: {status} - {error_text}");
        }

        Ok(response)
    }
}

#[async_trait]
impl SandboxPlatform for HttpSandboxPlatform {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn lookup_volume(&self, name: &str) -> Result<VolumeRef> {
        let url = self.endpoint(&["v1", "volumes", "lookup"])?;
        let body = json!({ "name": name, "create_if_missing": true });

        let response = self
            .send(self.client.post(url).json(&body), "volume lookup")
            .await?;
        let volume: VolumeRef = response
            .json()
            .await
            .context("Invalid volume lookup response")?;

        debug!(volume = %volume.name, volume_id = %volume.volume_id, "Resolved volume");
        Ok(volume)
    }

    async fn create_sandbox(&self, request: &SandboxRequest) -> Result<SandboxHandle> {
        let url = self.endpoint(&["v1", "sandboxes"])?;

        let response = self
            .send(self.client.post(url).json(request), "sandbox creation")
            .await?;
        let handle: SandboxHandle = response
            .json()
            .await
            .context("Invalid sandbox creation response")?;

        Ok(handle)
    }

    async fn tunnels(&self, sandbox_id: &str) -> Result<HashMap<u16, Tunnel>> {
        let url = self.endpoint(&["v1", "sandboxes", sandbox_id, "tunnels"])?;

        let response = self.send(self.client.get(url), "tunnel query").await?;
        let body: TunnelsResponse = response
            .json()
            .await
            .context("Invalid tunnel response")?;

        Ok(body.tunnels)
    }

    async fn terminate(&self, sandbox_id: &str) -> Result<()> {
        let url = self.endpoint(&["v1", "sandboxes", sandbox_id, "terminate"])?;

        self.send(self.client.post(url), "sandbox termination")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(base: &str) -> HttpSandboxPlatform {
        HttpSandboxPlatform::new(base, None, Duration::from_secs(5)).expect("valid platform")
    }

    #[test]
    fn test_endpoint_appends_segments() {
        let platform = platform("https://sandbox.example/api");
        let url = platform
            .endpoint(&["v1", "sandboxes", "sb-1", "tunnels"])
            .unwrap();
        assert_eq!(url.as_str(), "https://sandbox.example/api/v1/sandboxes/sb-1/tunnels");
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let platform = platform("https://sandbox.example/");
        let url = platform.endpoint(&["v1", "sandboxes"]).unwrap();
        assert_eq!(url.as_str(), "https://sandbox.example/v1/sandboxes");
    }

    #[test]
    fn test_endpoint_escapes_ids() {
        let platform = platform("https://sandbox.example");
        let url = platform.endpoint(&["v1", "sandboxes", "a/b"]).unwrap();
        assert_eq!(url.as_str(), "https://sandbox.example/v1/sandboxes/a%2Fb");
    }

    #[test]
    fn test_rejects_invalid_base() {
        assert!(HttpSandboxPlatform::new("not a url", None, Duration::from_secs(5)).is_err());
        assert!(HttpSandboxPlatform::new("mailto:ops@example.com", None, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_tunnels_response_parses_port_keys() {
        let body: TunnelsResponse = serde_json::from_str(
            r#"{"tunnels": {"8000": {"host": "abc.example", "port": 443}}}"#,
        )
        .unwrap();
        assert_eq!(body.tunnels[&8000].host, "abc.example");
    }
}
