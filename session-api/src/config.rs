use serde::Deserialize;
use session_orchestrator::Settings;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "Settings::from_env")]
    pub settings: Settings,
}

fn default_bind_addr() -> String {
    std::env::var("SESSION_API_BIND").unwrap_or_else(|_| "0.0.0.0:8002".to_string())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            settings: Settings::from_env(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }
}
