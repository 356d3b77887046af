//! # GravoKit Core
//!
//! Core types for GravoKit.
//! Provides the error taxonomy and the typed machine data model shared by
//! the communication layer, the settings crate, and the command-line client.

pub mod error;
pub mod machine;

pub use error::{ConnectionError, Error, ErrorCategory, MachineFault, Result};

pub use machine::{
    LoadMode, MachineState, MachineStatus, MarkMode, MarkingOutcome, RearmState,
};
