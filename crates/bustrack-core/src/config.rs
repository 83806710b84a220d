//! Configuration loading and typed config structures for Bustrack.
//!
//! The canonical configuration lives in `bustrack.yaml` next to the binary.
//! This module defines strongly-typed structs that mirror the YAML
//! structure, and provides a loader that reads and validates the file.
//! Every key is optional; missing keys fall back to the defaults below.

use std::path::Path;

use serde::Deserialize;

use crate::reconciler::MergePolicy;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level Bustrack configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrackerConfig {
    /// Live channel settings and reconnection policy.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// REST collaborator settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Roster merge behaviour.
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reference feed server settings.
    #[serde(default)]
    pub feed: FeedConfig,
}

impl TrackerConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `BUSTRACK_WS_URL` overrides `connection.address`
    /// - `BUSTRACK_API_URL` overrides `api.base_url`
    /// - `BUSTRACK_FEED_PORT` overrides `feed.port`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Like [`Self::from_file`], but a missing file yields the defaults
    /// (with environment overrides still applied).
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.apply_env_overrides();
                Ok(config)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override addresses with environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("BUSTRACK_WS_URL") {
            self.connection.address = val;
        }
        if let Ok(val) = std::env::var("BUSTRACK_API_URL") {
            self.api.base_url = val;
        }
        if let Some(port) = std::env::var("BUSTRACK_FEED_PORT")
            .ok()
            .and_then(|val| val.parse().ok())
        {
            self.feed.port = port;
        }
    }
}

/// Live channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// WebSocket address of the fleet-wide channel.
    #[serde(default = "default_address")]
    pub address: String,

    /// Fixed delay before each reconnection attempt.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Reconnection attempts allowed before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Delay between connecting and the first explicit `get_buses` request.
    #[serde(default = "default_snapshot_request_delay_ms")]
    pub snapshot_request_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            snapshot_request_delay_ms: default_snapshot_request_delay_ms(),
        }
    }
}

/// REST collaborator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiConfig {
    /// Base URL all REST paths are joined onto.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Roster reconciliation configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ReconcilerConfig {
    /// How incremental patches are ordered against each other.
    #[serde(default)]
    pub merge_policy: MergePolicy,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Reference feed server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Interface to bind.
    #[serde(default = "default_feed_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_feed_port")]
    pub port: u16,

    /// Run the movement simulator.
    #[serde(default = "default_true")]
    pub simulate: bool,

    /// Interval between simulated movements.
    #[serde(default = "default_simulation_interval_ms")]
    pub simulation_interval_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: default_feed_host(),
            port: default_feed_port(),
            simulate: default_true(),
            simulation_interval_ms: default_simulation_interval_ms(),
        }
    }
}

fn default_address() -> String {
    "ws://localhost:8000/ws/buses/".to_owned()
}

const fn default_reconnect_delay_ms() -> u64 {
    5000
}

const fn default_max_reconnect_attempts() -> u32 {
    10
}

const fn default_snapshot_request_delay_ms() -> u64 {
    1000
}

fn default_api_base_url() -> String {
    "http://localhost:8000/api".to_owned()
}

const fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_feed_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_feed_port() -> u16 {
    8000
}

const fn default_true() -> bool {
    true
}

const fn default_simulation_interval_ms() -> u64 {
    10_000
}
