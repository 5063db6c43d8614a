//! Configuration management for the statement executor.
//!
//! Handles loading configuration from TOML files and environment variables.
//! The executor section is handed opaquely to every executable it creates.

use crate::error::{ExecutorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Execution context threaded through to every executable.
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Session actor tuning.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Connector the statements are executed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connector identifier (e.g., "postgres", "hive").
    #[serde(default = "default_connector_id")]
    pub id: String,

    /// SQL dialect used to split scripts into statements.
    #[serde(default = "default_dialect")]
    pub dialect: String,
}

fn default_connector_id() -> String {
    "postgres".to_string()
}

fn default_dialect() -> String {
    "postgresql".to_string()
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            id: default_connector_id(),
            dialect: default_dialect(),
        }
    }
}

/// Construction-time context for executables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Connector (and dialect) to execute against.
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Compute target identifier.
    #[serde(default = "default_compute")]
    pub compute: String,

    /// Namespace identifier.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Database statements run against until a `USE` switches it.
    #[serde(default = "default_database")]
    pub database: String,

    /// Default row limit applied to result sets.
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Whether the connector is backed by a SQL engine.
    #[serde(default = "default_true")]
    pub is_sql_engine: bool,

    /// Whether the query optimizer integration is enabled.
    #[serde(default)]
    pub is_optimizer_enabled: bool,

    /// Values for `${name}` placeholders in statements.
    #[serde(default)]
    pub variables: HashMap<String, String>,
}

fn default_compute() -> String {
    "default".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_database() -> String {
    "default".to_string()
}

fn default_limit() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            connector: ConnectorConfig::default(),
            compute: default_compute(),
            namespace: default_namespace(),
            database: default_database(),
            default_limit: default_limit(),
            is_sql_engine: default_true(),
            is_optimizer_enabled: false,
            variables: HashMap::new(),
        }
    }
}

impl ExecutorConfig {
    /// Applies environment variables (GLANCE_DATABASE, GLANCE_DEFAULT_LIMIT) as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.database == default_database() {
            if let Ok(database) = std::env::var("GLANCE_DATABASE") {
                if !database.trim().is_empty() {
                    self.database = database;
                }
            }
        }
        if self.default_limit == default_limit() {
            if let Ok(limit_str) = std::env::var("GLANCE_DEFAULT_LIMIT") {
                if let Ok(limit) = limit_str.parse() {
                    self.default_limit = limit;
                }
            }
        }
    }

    /// Returns a short display string for logs and the CLI header.
    pub fn display_string(&self) -> String {
        format!(
            "{} ({}) / {} / {}.{}",
            self.connector.id, self.connector.dialect, self.compute, self.namespace, self.database
        )
    }
}

/// Session actor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capacity of the command and completion channels.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Capacity of the executor event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_channel_capacity() -> usize {
    32
}

fn default_event_capacity() -> usize {
    256
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glance-executor")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ExecutorError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            ExecutorError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;

        if config.session.channel_capacity == 0 || config.session.event_capacity == 0 {
            return Err(ExecutorError::config(format!(
                "Configuration error in {}:\n  session capacities must be greater than zero",
                path.display()
            )));
        }

        Ok(config)
    }
}
