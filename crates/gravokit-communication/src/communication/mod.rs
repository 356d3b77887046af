//! Transport layer for the marking machine
//!
//! - [`codec`]: CR/LF line framing and list-response framing over any async stream
//! - [`connection`]: socket lifecycle (connect, close, reconnect with backoff)
//! - [`dispatcher`]: the transaction lock and the write-then-read contract

pub mod codec;
pub mod connection;
pub mod dispatcher;

use async_trait::async_trait;
use gravokit_core::Result;
use std::time::Duration;

pub use codec::LineCodec;
pub use connection::{backoff_delay, ConnectionManager, ConnectionSettings};
pub use dispatcher::{Dispatcher, Transaction};

/// How long a single read may wait for its line terminator
///
/// The limit applies to one call only; it never changes the timeout
/// configured on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadLimit {
    /// Use the operational timeout configured on the connection
    #[default]
    Default,
    /// Wait at most this long
    Within(Duration),
    /// Wait until a line arrives or the peer closes the stream
    Unbounded,
}

impl ReadLimit {
    /// Build a limit from an optional duration, `None` meaning unbounded
    pub fn from_option(timeout: Option<Duration>) -> Self {
        match timeout {
            Some(duration) => Self::Within(duration),
            None => Self::Unbounded,
        }
    }

    /// Resolve against the connection's configured timeout
    pub fn resolve(self, configured: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Default => configured,
            Self::Within(duration) => Some(duration),
            Self::Unbounded => None,
        }
    }
}

/// A bidirectional line channel to the machine
///
/// Implemented by the raw [`LineCodec`] and by a held [`Transaction`],
/// so multi-read sequences can be written once and driven by either.
#[async_trait]
pub trait LineChannel: Send {
    /// Send one command line, appending CR if missing
    async fn send_command(&mut self, command: &str) -> Result<()>;

    /// Receive one line with its terminator stripped
    async fn receive_line(&mut self, limit: ReadLimit) -> Result<String>;
}
