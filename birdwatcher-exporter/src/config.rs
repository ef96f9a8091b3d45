//! Configuration for the BIRD exporter.

use birdwatcher_common::{LoggingConfig, load_config, parse_config};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Load(#[from] birdwatcher_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// How to query the BIRD daemon.
    #[serde(default)]
    pub birdc: BirdcConfig,

    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Protocol instance filtering.
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Status command settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BirdcConfig {
    /// Program and arguments printing `show protocols all` output on stdout.
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Kill the command and fail the scrape after this many seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_command() -> Vec<String> {
    [
        "birdcl",
        "-s",
        "/var/run/calico/bird.ctl",
        "show",
        "protocols",
        "all",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_timeout() -> u64 {
    10
}

impl Default for BirdcConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            timeout_secs: default_timeout(),
        }
    }
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:6502").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:6502".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Protocol instance filtering configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Glob patterns for instances to include (empty = all).
    #[serde(default)]
    pub include_instances: Vec<String>,

    /// Glob patterns for instances to exclude.
    #[serde(default)]
    pub exclude_instances: Vec<String>,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: ExporterConfig = load_config(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = parse_config(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.birdc.command.first().is_none_or(|program| program.is_empty()) {
            return Err(ConfigError::Validation(
                "birdc.command must name a program".to_string(),
            ));
        }

        if self.birdc.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self.http.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.http.listen
            )));
        }

        // Validate path starts with /
        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        for pattern in self
            .filters
            .include_instances
            .iter()
            .chain(&self.filters.exclude_instances)
        {
            glob::Pattern::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("Invalid instance pattern '{}': {}", pattern, e))
            })?;
        }

        Ok(())
    }
}
