//! Cache configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_CACHE_MAX_ENTRIES, DEFAULT_CACHE_TTL_SECONDS, MAX_DURATION_SECS};

/// PDF response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Serve and store rendered PDFs (default: true)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum number of cached documents (default: 100)
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    /// Time-to-live of a cached document in seconds (default: 3600)
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_entries: default_max_entries(),
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_entries() -> usize {
    DEFAULT_CACHE_MAX_ENTRIES
}

fn default_ttl_seconds() -> u64 {
    DEFAULT_CACHE_TTL_SECONDS
}

impl CacheConfig {
    /// TTL as a Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("cache.max_entries must be greater than 0".to_string());
        }
        if self.ttl_seconds == 0 {
            return Err("cache.ttl_seconds must be greater than 0".to_string());
        }
        if self.ttl_seconds > MAX_DURATION_SECS {
            return Err(format!(
                "cache.ttl_seconds must be at most {} seconds",
                MAX_DURATION_SECS
            ));
        }
        Ok(())
    }
}
