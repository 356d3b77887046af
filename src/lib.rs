//! # GravoKit
//!
//! Control layer for Gravotech laser marking machines speaking their
//! line-oriented TCP protocol.
//!
//! ## Architecture
//!
//! GravoKit is organized as a workspace with multiple crates:
//!
//! 1. **gravokit-core** - Error taxonomy and machine data types
//! 2. **gravokit-communication** - Line codec, connection, dispatcher,
//!    start-marking sequence, error decoding and the action facade
//! 3. **gravokit-settings** - Configuration files and environment overrides
//! 4. **gravokit** - This crate: logging setup and the `gravokit` binary

pub mod cli;

pub use gravokit_communication::{
    Actions, ConnectionSettings, Dispatcher, Gravotech, ReadLimit, Transaction,
};
pub use gravokit_core::{
    ConnectionError, Error, ErrorCategory, LoadMode, MachineFault, MachineState, MachineStatus,
    MarkMode, MarkingOutcome, RearmState, Result,
};
pub use gravokit_settings::{Config, MachineSettings, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// INFO unless `RUST_LOG` says otherwise.
pub fn init_logging() -> anyhow::Result<()> {
    init_logging_with(tracing::Level::INFO)
}

/// Initialize logging to stderr with `default_level` as the fallback filter
///
/// `RUST_LOG` takes precedence when set. Stdout stays free for replies.
pub fn init_logging_with(default_level: tracing::Level) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_str().to_lowercase()));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise logging: {}", e))?;

    Ok(())
}
