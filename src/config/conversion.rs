//! Conversion configuration types.
//!
//! Input limits, render timeout and concurrency, and the external renderer
//! invocation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_RENDERS, DEFAULT_MAX_HTML_BYTES, DEFAULT_RENDERER_COMMAND,
    DEFAULT_RENDER_TIMEOUT_SECS, MAX_DURATION_SECS,
};

fn default_max_html_bytes() -> usize {
    DEFAULT_MAX_HTML_BYTES
}

fn default_render_timeout_seconds() -> u64 {
    DEFAULT_RENDER_TIMEOUT_SECS
}

fn default_max_concurrent_renders() -> usize {
    DEFAULT_MAX_CONCURRENT_RENDERS
}

fn default_renderer_command() -> String {
    DEFAULT_RENDERER_COMMAND.to_string()
}

fn default_renderer_args() -> Vec<String> {
    // HTML on stdin, PDF on stdout
    vec!["-".to_string(), "-".to_string()]
}

/// External renderer program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RendererConfig {
    #[serde(default = "default_renderer_command")]
    pub command: String,
    #[serde(default = "default_renderer_args")]
    pub args: Vec<String>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: default_renderer_command(),
            args: default_renderer_args(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionConfig {
    /// Inputs at or above this size are rejected (default: 10 MiB)
    #[serde(default = "default_max_html_bytes")]
    pub max_html_bytes: usize,
    /// Bound on queue wait plus render, in seconds (default: 30)
    #[serde(default = "default_render_timeout_seconds")]
    pub render_timeout_seconds: u64,
    /// Renders allowed in flight at once (default: 4)
    #[serde(default = "default_max_concurrent_renders")]
    pub max_concurrent_renders: usize,
    #[serde(default)]
    pub renderer: RendererConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            max_html_bytes: default_max_html_bytes(),
            render_timeout_seconds: default_render_timeout_seconds(),
            max_concurrent_renders: default_max_concurrent_renders(),
            renderer: RendererConfig::default(),
        }
    }
}

impl ConversionConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_html_bytes == 0 {
            return Err("conversion.max_html_bytes must be greater than 0".to_string());
        }
        if self.render_timeout_seconds == 0 {
            return Err("conversion.render_timeout_seconds must be greater than 0".to_string());
        }
        if self.render_timeout_seconds > MAX_DURATION_SECS {
            return Err(format!(
                "conversion.render_timeout_seconds must be at most {} seconds",
                MAX_DURATION_SECS
            ));
        }
        if self.max_concurrent_renders == 0 {
            return Err("conversion.max_concurrent_renders must be greater than 0".to_string());
        }
        if self.renderer.command.trim().is_empty() {
            return Err("conversion.renderer.command cannot be empty".to_string());
        }
        Ok(())
    }
}
