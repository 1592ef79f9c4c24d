//! Gateway configuration.
//!
//! Loaded once at startup: built-in defaults, then an optional TOML file, then
//! `NYTECHAT__*` environment variables. Values are fixed for the life of the process.
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | NYTECHAT_CONFIG | config/nytechat.toml | Path of the optional TOML file. |
//! | NYTECHAT__PORT | 3000 | Gateway port. |
//! | NYTECHAT__DAILY_REQUEST_LIMIT | 1000 | Process-wide upstream calls per window. |
//! | NYTECHAT__CLIENT_REQUEST_LIMIT | 25 | Per-client `/api/*` calls per window. |
//! | GROK_API_KEY / XAI_API_KEY | (unset) | Upstream credential (never read from the file). |

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config/nytechat.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub daily_request_limit: u32,
    pub daily_window_secs: u64,
    pub client_request_limit: u32,
    pub client_window_secs: u64,
    pub sweep_interval_secs: u64,
    /// Client keys (IP addresses) that skip per-client limiting.
    #[serde(default)]
    pub client_whitelist: Vec<String>,
    pub max_conversation_messages: usize,
    pub upstream_url: String,
    pub upstream_model: String,
    pub upstream_temperature: f32,
    pub upstream_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            daily_request_limit: 1000,
            daily_window_secs: 24 * 60 * 60,
            client_request_limit: 25,
            client_window_secs: 60 * 60,
            sweep_interval_secs: 60,
            client_whitelist: Vec::new(),
            max_conversation_messages: 50,
            upstream_url: "https://api.x.ai/v1/chat/completions".to_string(),
            upstream_model: "grok-3-mini-beta".to_string(),
            upstream_temperature: 0.7,
            upstream_timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// Precedence: env `NYTECHAT__*` > file at `NYTECHAT_CONFIG` (or `config/nytechat.toml`) > defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("NYTECHAT_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let d = GatewayConfig::default();
        let builder = config::Config::builder()
            .set_default("host", d.host)?
            .set_default("port", i64::from(d.port))?
            .set_default("daily_request_limit", i64::from(d.daily_request_limit))?
            .set_default("daily_window_secs", d.daily_window_secs as i64)?
            .set_default("client_request_limit", i64::from(d.client_request_limit))?
            .set_default("client_window_secs", d.client_window_secs as i64)?
            .set_default("sweep_interval_secs", d.sweep_interval_secs as i64)?
            .set_default("max_conversation_messages", d.max_conversation_messages as i64)?
            .set_default("upstream_url", d.upstream_url)?
            .set_default("upstream_model", d.upstream_model)?
            .set_default("upstream_temperature", f64::from(d.upstream_temperature))?
            .set_default("upstream_timeout_secs", d.upstream_timeout_secs as i64)?;
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };
        let built = builder
            .add_source(
                config::Environment::with_prefix("NYTECHAT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("client_whitelist")
                    .try_parsing(true),
            )
            .build()?;
        Ok(built.try_deserialize()?)
    }

    pub fn daily_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.daily_window_secs as i64)
    }

    pub fn client_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.client_window_secs as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream credential: `GROK_API_KEY`, then `XAI_API_KEY`. Blank values count as unset.
pub fn upstream_api_key() -> Option<String> {
    ["GROK_API_KEY", "XAI_API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}
