//! GravoKit Settings Crate
//!
//! Loads, validates and saves the machine connection configuration.

pub mod config;
pub mod error;

pub use config::{Config, MachineSettings, ENV_HOST, ENV_PORT, ENV_TIMEOUT_MS};
pub use error::{SettingsError, SettingsResult};
