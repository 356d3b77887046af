//! Configuration for GravoKit
//!
//! Handles the configuration file, environment overrides and validation.
//! Supports JSON and TOML file formats; the default location is
//! `<platform config dir>/gravokit/config.toml`.

use crate::error::{SettingsError, SettingsResult};
use gravokit_communication::communication::connection::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_PORT,
    DEFAULT_RECONNECT_DELAY, DEFAULT_TIMEOUT,
};
use gravokit_communication::ConnectionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `machine.host`
pub const ENV_HOST: &str = "GRAVOTECH_HOST";
/// Environment variable overriding `machine.port`
pub const ENV_PORT: &str = "GRAVOTECH_PORT";
/// Environment variable overriding `machine.timeout_ms`
pub const ENV_TIMEOUT_MS: &str = "GRAVOTECH_TIMEOUT_MS";

/// Machine connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Hostname or IP address of the machine
    pub host: String,
    /// TCP port of the command session
    pub port: u16,
    /// Operational read/write timeout in ms (0 = block indefinitely)
    pub timeout_ms: u64,
    /// Connection establishment timeout in ms
    pub connect_timeout_ms: u64,
    /// Attempts made by one reconnection cycle
    pub max_reconnect_attempts: u32,
    /// Base backoff delay between reconnection attempts in ms
    pub reconnect_delay_ms: u64,
    /// Per-read bound while marking, in ms; absent waits for the whole cycle
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marking_timeout_ms: Option<u64>,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY.as_millis() as u64,
            marking_timeout_ms: None,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Machine connection settings
    pub machine: MachineSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

impl Format {
    fn of(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Default config file location
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| {
            SettingsError::ConfigDirectory("no platform config directory".to_string())
        })?;
        Ok(dir.join("gravokit").join("config.toml"))
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = Format::of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load `path`, or the default location if it exists, or the defaults
    ///
    /// Environment overrides are applied and the result validated.
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::default_path() {
                Ok(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Apply `GRAVOTECH_*` environment overrides
    pub fn apply_env_overrides(&mut self) -> SettingsResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> SettingsResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_HOST) {
            tracing::debug!(host = %host, "Host overridden from environment");
            self.machine.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            self.machine.port = port
                .trim()
                .parse()
                .map_err(|_| SettingsError::invalid(ENV_PORT, format!("not a port: {:?}", port)))?;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            self.machine.timeout_ms = timeout.trim().parse().map_err(|_| {
                SettingsError::invalid(ENV_TIMEOUT_MS, format!("not a number: {:?}", timeout))
            })?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let machine = &self.machine;

        if machine.host.trim().is_empty() {
            return Err(SettingsError::invalid("machine.host", "must not be empty"));
        }

        if machine.port == 0 {
            return Err(SettingsError::invalid("machine.port", "must be > 0"));
        }

        if machine.connect_timeout_ms == 0 {
            return Err(SettingsError::invalid(
                "machine.connect_timeout_ms",
                "must be > 0",
            ));
        }

        if machine.max_reconnect_attempts == 0 {
            return Err(SettingsError::invalid(
                "machine.max_reconnect_attempts",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// Settings for the communication layer
    pub fn connection_settings(&self) -> ConnectionSettings {
        let machine = &self.machine;
        let timeout = match machine.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        ConnectionSettings::new(machine.host.clone(), machine.port)
            .with_connect_timeout(Duration::from_millis(machine.connect_timeout_ms))
            .with_timeout(timeout)
            .with_reconnect(
                machine.max_reconnect_attempts,
                Duration::from_millis(machine.reconnect_delay_ms),
            )
            .with_marking_timeout(machine.marking_timeout_ms.map(Duration::from_millis))
    }
}
