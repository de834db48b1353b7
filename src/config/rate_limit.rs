//! Rate limiting configuration types.
//!
//! Per-client sliding window limits, plus an optional global ceiling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_RATE_WINDOW_SECS, DEFAULT_REQUESTS_PER_WINDOW, MAX_DURATION_SECS};

fn default_enabled() -> bool {
    true
}

fn default_requests_per_window() -> u32 {
    DEFAULT_REQUESTS_PER_WINDOW
}

fn default_window_seconds() -> u64 {
    DEFAULT_RATE_WINDOW_SECS
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Requests admitted per client within any trailing window (default: 60)
    #[serde(default = "default_requests_per_window")]
    pub requests_per_window: u32,
    /// Sliding window length in seconds (default: 60)
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Global requests per second across all clients (default: unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_requests_per_second: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            requests_per_window: default_requests_per_window(),
            window_seconds: default_window_seconds(),
            global_requests_per_second: None,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.enabled {
            return Ok(());
        }
        if self.requests_per_window == 0 {
            return Err("rate_limit.requests_per_window must be greater than 0".to_string());
        }
        if self.window_seconds == 0 {
            return Err("rate_limit.window_seconds must be greater than 0".to_string());
        }
        if self.window_seconds > MAX_DURATION_SECS {
            return Err(format!(
                "rate_limit.window_seconds must be at most {} seconds",
                MAX_DURATION_SECS
            ));
        }
        Ok(())
    }
}
