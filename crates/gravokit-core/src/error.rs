//! Error handling for GravoKit
//!
//! Provides the error taxonomy shared by every layer talking to a marking machine:
//! - Connection errors (opening, re-opening, or missing sockets)
//! - Transport faults (transient network errors, peer closing the stream)
//! - Protocol violations (replies that do not have the expected shape)
//! - Machine faults (decoded `ER <type> <detail>` refusals)
//! - Validation errors (undecodable `ER` lines, rejected arguments)
//!
//! All error types use `thiserror` for ergonomic error handling.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection error type
///
/// Represents failures to obtain a usable socket to the machine.
/// These are always fatal for the call that hit them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// The TCP connection could not be established
    #[error("Connection to {addr} failed: {reason}")]
    ConnectFailed {
        /// The `host:port` that was dialled.
        addr: String,
        /// Why the connection failed.
        reason: String,
    },

    /// Every reconnection attempt failed
    #[error("Unable to reconnect to {addr} after {attempts} attempts")]
    ReconnectExhausted {
        /// The `host:port` that was dialled.
        addr: String,
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// An operation needed a socket but none is open
    #[error("Not connected")]
    NotConnected,
}

/// Category of a machine-reported error, the `<type>` field of an `ER` line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Type 1
    Syntax,
    /// Type 2
    Context,
    /// Type 3
    Processing,
    /// Type 4
    Authorization,
}

impl ErrorCategory {
    /// Look up a category from its wire code
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Syntax),
            "2" => Some(Self::Context),
            "3" => Some(Self::Processing),
            "4" => Some(Self::Authorization),
            _ => None,
        }
    }

    /// Wire code of this category
    pub fn code(&self) -> u8 {
        match self {
            Self::Syntax => 1,
            Self::Context => 2,
            Self::Processing => 3,
            Self::Authorization => 4,
        }
    }

    /// Human-readable category name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Syntax => "Syntax error",
            Self::Context => "Context error (invalid state)",
            Self::Processing => "Processing error",
            Self::Authorization => "Authorization error",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded `ER <type> <detail>` line
///
/// This is a legitimate refusal by the machine, not a transport fault,
/// and is never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{category}: {description} (code: {}.{detail})", .category.code())]
pub struct MachineFault {
    /// Error category (the `<type>` field)
    pub category: ErrorCategory,
    /// Detail code exactly as sent by the machine
    pub detail: String,
    /// Description looked up for `(category, detail)`
    pub description: String,
}

impl MachineFault {
    /// Create a new machine fault
    pub fn new(
        category: ErrorCategory,
        detail: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category,
            detail: detail.into(),
            description: description.into(),
        }
    }

    /// The `<type>.<detail>` code of this fault
    pub fn code(&self) -> String {
        format!("{}.{}", self.category.code(), self.detail)
    }
}

/// Main error type for GravoKit
///
/// A unified error type covering every failure a caller can observe.
/// Callers branch on the variant rather than inspecting message text.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection error (initial connect, reconnect exhausted, no socket)
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Transient send/receive fault mid-transaction
    #[error("Network error: {reason}")]
    Network {
        /// What went wrong on the wire.
        reason: String,
    },

    /// The peer closed the stream before a line terminator arrived
    #[error("Connection closed by remote host")]
    ConnectionClosed,

    /// The machine's reply violated the expected shape
    #[error("Protocol error: {reason}")]
    Protocol {
        /// Description of the violation.
        reason: String,
    },

    /// The machine refused the command with a decoded `ER` line
    #[error(transparent)]
    Machine(#[from] MachineFault),

    /// An `ER` line could not be decoded
    #[error("Validation error: {reason}")]
    Validation {
        /// Why the line could not be decoded.
        reason: String,
    },

    /// A caller-supplied argument cannot be put on the wire
    #[error("Invalid parameter: {reason}")]
    InvalidParameter {
        /// Why the argument was rejected.
        reason: String,
    },

    /// Standard I/O error not classified as a transient network fault
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a network error
    pub fn network(reason: impl Into<String>) -> Self {
        Error::Network {
            reason: reason.into(),
        }
    }

    /// Create a protocol error
    pub fn protocol(reason: impl Into<String>) -> Self {
        Error::Protocol {
            reason: reason.into(),
        }
    }

    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Error::Validation {
            reason: reason.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            reason: reason.into(),
        }
    }

    /// Check if this is a transient network fault eligible for one retry
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// Check if this is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Check if this is a decoded machine refusal
    pub fn is_machine_error(&self) -> bool {
        matches!(self, Error::Machine(_))
    }

    /// Check if this is a protocol violation
    pub fn is_protocol_error(&self) -> bool {
        matches!(self, Error::Protocol { .. })
    }

    /// The decoded machine fault, if this is one
    pub fn machine_fault(&self) -> Option<&MachineFault> {
        match self {
            Error::Machine(fault) => Some(fault),
            _ => None,
        }
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;
