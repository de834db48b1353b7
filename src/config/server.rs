//! Server and logging configuration types.
//!
//! Default values are sourced from `crate::constants`.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ADDRESS, DEFAULT_PORT};

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_cors_allow_any() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow any origin, so the dashboard can be served from elsewhere
    #[serde(default = "default_cors_allow_any")]
    pub cors_allow_any: bool,
    /// Key rate limits on the first `X-Forwarded-For` hop instead of the peer
    /// address. Only enable behind a proxy that overwrites the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            cors_allow_any: default_cors_allow_any(),
            trust_forwarded_for: false,
        }
    }
}

impl ServerConfig {
    /// "address:port" listen string
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line (container deployments)
    #[default]
    Json,
    /// Human-readable output
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; RUST_LOG takes precedence when set
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
