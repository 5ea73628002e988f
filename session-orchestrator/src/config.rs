use serde::Deserialize;
use std::path::PathBuf;

/// Tokens shorter than this are never issued, whatever the configuration says.
pub const MIN_TOKEN_LENGTH: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_token_length")]
    pub token_length: usize,

    #[serde(default = "default_storage_root")]
    pub workspace_storage_root: PathBuf,

    /// Base of the placeholder URLs handed out when no real tunnel exists.
    #[serde(default = "default_local_sandbox_host")]
    pub local_sandbox_host: String,

    #[serde(default = "default_entrypoint")]
    pub default_entrypoint: String,

    /// Sandbox platform gateway. Unset means stub mode.
    #[serde(default = "default_sandbox_api_url")]
    pub sandbox_api_url: Option<String>,

    #[serde(default = "default_sandbox_api_token")]
    pub sandbox_api_token: Option<String>,

    #[serde(default = "default_sandbox_app_name")]
    pub sandbox_app_name: String,

    #[serde(default = "default_sandbox_timeout")]
    pub sandbox_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub sandbox_request_timeout_secs: u64,

    /// Empty disables the notebooks volume.
    #[serde(default = "default_volume_notebooks")]
    pub volume_notebooks: String,

    /// Empty disables the dependency cache volume.
    #[serde(default = "default_volume_cache")]
    pub volume_cache: String,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn default_token_length() -> usize {
    env_parsed("SESSION_TOKEN_LENGTH").unwrap_or(24)
}

fn default_storage_root() -> PathBuf {
    env_string("WORKSPACE_STORAGE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./data/workspaces"))
}

fn default_local_sandbox_host() -> String {
    env_string("LOCAL_SANDBOX_HOST").unwrap_or_else(|| "http://localhost:8866".to_string())
}

fn default_entrypoint() -> String {
    env_string("DEFAULT_ENTRYPOINT").unwrap_or_else(|| "main.py".to_string())
}

fn default_sandbox_api_url() -> Option<String> {
    env_string("SANDBOX_API_URL")
}

fn default_sandbox_api_token() -> Option<String> {
    env_string("SANDBOX_API_TOKEN")
}

fn default_sandbox_app_name() -> String {
    env_string("SANDBOX_APP_NAME").unwrap_or_else(|| "notebook-sessions".to_string())
}

fn default_sandbox_timeout() -> u64 {
    env_parsed("SANDBOX_TIMEOUT_SECONDS").unwrap_or(7200) // 2 hours
}

fn default_request_timeout() -> u64 {
    env_parsed("SANDBOX_REQUEST_TIMEOUT_SECONDS").unwrap_or(60)
}

fn default_volume_notebooks() -> String {
    std::env::var("SANDBOX_VOLUME_NOTEBOOKS").unwrap_or_else(|_| "marimo-notebooks".to_string())
}

fn default_volume_cache() -> String {
    std::env::var("SANDBOX_VOLUME_CACHE").unwrap_or_else(|_| "marimo-uv-cache".to_string())
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            token_length: default_token_length(),
            workspace_storage_root: default_storage_root(),
            local_sandbox_host: default_local_sandbox_host(),
            default_entrypoint: default_entrypoint(),
            sandbox_api_url: default_sandbox_api_url(),
            sandbox_api_token: default_sandbox_api_token(),
            sandbox_app_name: default_sandbox_app_name(),
            sandbox_timeout_secs: default_sandbox_timeout(),
            sandbox_request_timeout_secs: default_request_timeout(),
            volume_notebooks: default_volume_notebooks(),
            volume_cache: default_volume_cache(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Settings for local runs and tests: stub mode, storage under `root`.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            token_length: 24,
            workspace_storage_root: root.into(),
            local_sandbox_host: "http://localhost:8866".to_string(),
            default_entrypoint: "main.py".to_string(),
            sandbox_api_url: None,
            sandbox_api_token: None,
            sandbox_app_name: "notebook-sessions".to_string(),
            sandbox_timeout_secs: 7200,
            sandbox_request_timeout_secs: 60,
            volume_notebooks: "marimo-notebooks".to_string(),
            volume_cache: "marimo-uv-cache".to_string(),
        }
    }

    /// Configured token length, floored at [`MIN_TOKEN_LENGTH`].
    pub fn effective_token_length(&self) -> usize {
        self.token_length.max(MIN_TOKEN_LENGTH)
    }

    pub fn live_mode(&self) -> bool {
        self.sandbox_api_url.is_some()
    }
}
