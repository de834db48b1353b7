// Configuration module
//
// A closed, typed YAML schema. Every field has a default, unknown fields are
// rejected, and `validate()` runs before any component is built.

pub mod conversion;
pub mod metrics;
pub mod rate_limit;
pub mod server;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::cache::CacheConfig;
pub use conversion::{ConversionConfig, RendererConfig};
pub use metrics::{MetricsConfig, SweeperConfig};
pub use rate_limit::RateLimitConfig;
pub use server::{LogFormat, LoggingConfig, ServerConfig};

/// `${VAR_NAME}` references, upper-case names only
const ENV_VAR_PATTERN: &str = r"\$\{([A-Z_][A-Z0-9_]*)\}";

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{0}' is referenced but not set")]
    MissingEnvVar(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl Config {
    /// Parse YAML after replacing `${VAR_NAME}` with environment values
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, ConfigError> {
        let substituted = substitute_env_vars(yaml)?;
        let config: Config = serde_yaml::from_str(&substituted)?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_with_env(&yaml)
    }

    /// Check every section, reporting the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cache.validate().map_err(ConfigError::Invalid)?;
        self.conversion.validate().map_err(ConfigError::Invalid)?;
        self.rate_limit.validate().map_err(ConfigError::Invalid)?;
        self.metrics.validate().map_err(ConfigError::Invalid)?;
        self.sweeper.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

fn substitute_env_vars(yaml: &str) -> Result<String, ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).map_err(|e| ConfigError::Invalid(e.to_string()))?;

    // Fail on the first unset variable rather than substituting an empty string
    for caps in re.captures_iter(yaml) {
        let var_name = &caps[1];
        if std::env::var(var_name).is_err() {
            return Err(ConfigError::MissingEnvVar(var_name.to_string()));
        }
    }

    let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_default()
    });
    Ok(substituted.into_owned())
}
