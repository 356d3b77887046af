//! # GravoKit Communication
//!
//! TCP client for Gravotech marking machines: line framing, the shared
//! connection and its transaction lock, the start-marking sequence, error
//! decoding, and the named operations built on top.

pub mod actions;
pub mod client;
pub mod communication;
pub mod protocol;

pub use actions::Actions;
pub use client::Gravotech;
pub use communication::{
    backoff_delay, ConnectionManager, ConnectionSettings, Dispatcher, LineChannel, LineCodec,
    ReadLimit, Transaction,
};
pub use protocol::{
    check_reply, decode, is_list_command, Command, MarkingSequence, MarkingState,
};
