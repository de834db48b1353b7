//! Metrics and background sweeper configuration types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_HISTORY_SIZE, DEFAULT_STREAM_INTERVAL_SECS, DEFAULT_SWEEP_INTERVAL_SECS,
    MAX_DURATION_SECS,
};

fn default_history_size() -> usize {
    DEFAULT_HISTORY_SIZE
}

fn default_stream_interval_seconds() -> u64 {
    DEFAULT_STREAM_INTERVAL_SECS
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval_seconds() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Outcomes retained for /metrics/history (default: 1000)
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Push interval of the live feed in seconds (default: 5)
    #[serde(default = "default_stream_interval_seconds")]
    pub stream_interval_seconds: u64,
    /// Sample host CPU, memory, network and disk (default: true)
    #[serde(default = "default_true")]
    pub resource_monitoring: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            stream_interval_seconds: default_stream_interval_seconds(),
            resource_monitoring: default_true(),
        }
    }
}

impl MetricsConfig {
    pub fn stream_interval(&self) -> Duration {
        Duration::from_secs(self.stream_interval_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.history_size == 0 {
            return Err("metrics.history_size must be greater than 0".to_string());
        }
        if self.stream_interval_seconds == 0 {
            return Err("metrics.stream_interval_seconds must be greater than 0".to_string());
        }
        if self.stream_interval_seconds > MAX_DURATION_SECS {
            return Err(format!(
                "metrics.stream_interval_seconds must be at most {} seconds",
                MAX_DURATION_SECS
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweeperConfig {
    /// Seconds between sweeps (default: 300)
    #[serde(default = "default_sweep_interval_seconds")]
    pub interval_seconds: u64,
    /// Ask the renderer to release memory on each sweep (default: true)
    #[serde(default = "default_true")]
    pub reclaim_memory: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval_seconds(),
            reclaim_memory: default_true(),
        }
    }
}

impl SweeperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.interval_seconds == 0 {
            return Err("sweeper.interval_seconds must be greater than 0".to_string());
        }
        if self.interval_seconds > MAX_DURATION_SECS {
            return Err(format!(
                "sweeper.interval_seconds must be at most {} seconds",
                MAX_DURATION_SECS
            ));
        }
        Ok(())
    }
}
