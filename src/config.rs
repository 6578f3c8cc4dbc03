//! Server configuration parsing and validation.
//!
//! The front end spawns `syslink-server` with no arguments, so the TOML
//! config file is optional and every field carries a default. When a file
//! is supplied via `--config`, it is parsed and validated before the server
//! starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{AppError, Result};

/// Heartbeat emitter configuration.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct HeartbeatConfig {
    /// Seconds between outbound `ping` messages.
    #[serde(default = "default_heartbeat_seconds")]
    pub interval_seconds: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_heartbeat_seconds(),
        }
    }
}

fn default_heartbeat_seconds() -> u64 {
    10
}

/// Simulation toolkit configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    /// Directories searched for block library definitions.
    #[serde(default)]
    pub library_search_paths: Vec<PathBuf>,
}

fn default_max_line_bytes() -> usize {
    1_048_576
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Maximum accepted length of a single inbound wire line.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Heartbeat emitter settings.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    /// Simulation toolkit settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
            heartbeat: HeartbeatConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Interval between outbound heartbeat pings.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat.interval_seconds)
    }

    fn validate(&self) -> Result<()> {
        if self.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        if self.heartbeat.interval_seconds == 0 {
            return Err(AppError::Config(
                "heartbeat.interval_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
