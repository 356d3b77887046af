//! Command dispatch over the shared connection
//!
//! The protocol carries no request identifiers, so a reply is matched to its
//! command purely by send-then-receive order on the one socket. Every wire
//! transaction therefore runs while holding the transaction lock.
//!
//! [`Dispatcher::write`] holds the lock for one write+read. Multi-step
//! sequences take the lock once with [`Dispatcher::lock`] and drive the
//! returned [`Transaction`] directly; the lock is released when the guard is
//! dropped, on every exit path.
//!
//! A transaction that ends with a reply still owed (a failed exchange, or a
//! guard dropped mid-exchange by cancellation) leaves the connection out of
//! step. The next [`Dispatcher::lock`] replaces the socket before anyone can
//! read the late reply as their own.

use super::codec::LineCodec;
use super::connection::{ConnectionManager, ConnectionSettings};
use super::{LineChannel, ReadLimit};
use crate::protocol::commands::is_list_command;
use async_trait::async_trait;
use gravokit_core::{Error, Result};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};

/// Serialises all wire transactions on one connection
#[derive(Debug)]
pub struct Dispatcher {
    manager: Mutex<ConnectionManager>,
    settings: ConnectionSettings,
}

impl Dispatcher {
    /// Create a dispatcher; no socket is opened until [`connect`](Self::connect)
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            manager: Mutex::new(ConnectionManager::new(settings.clone())),
            settings,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Open the connection under the transaction lock
    pub async fn connect(&self) -> Result<()> {
        self.manager.lock().await.connect().await
    }

    /// Close the connection under the transaction lock
    ///
    /// Waits for any in-flight transaction to finish first.
    pub async fn close(&self) {
        self.manager.lock().await.close().await
    }

    pub async fn is_connected(&self) -> bool {
        self.manager.lock().await.is_connected()
    }

    /// Acquire the transaction lock
    ///
    /// Nothing else can reach the socket until the returned guard is dropped.
    /// A connection left out of step by an earlier transaction is replaced
    /// first; if that reconnect fails the transaction sees no socket.
    pub async fn lock(&self) -> Transaction<'_> {
        tracing::trace!("Waiting for transaction lock");
        let mut guard = self.manager.lock().await;
        tracing::trace!("Transaction lock acquired");

        if guard.is_out_of_step() {
            tracing::warn!(addr = %self.settings.addr(), "Replacing out-of-step connection");
            if let Err(e) = guard.connect().await {
                tracing::error!(error = %e, "Reconnect after interrupted transaction failed");
            }
        }

        Transaction {
            guard,
            pending: false,
        }
    }

    /// Send `command` and read its reply under the transaction lock
    ///
    /// List-class commands read a list response, everything else a single
    /// line. A transient network fault triggers one reconnection cycle and
    /// one repeat of the same exchange.
    pub async fn write(&self, command: &str) -> Result<String> {
        self.lock().await.exchange(command).await
    }

    /// Read one line under the transaction lock without sending anything
    pub async fn read(&self) -> Result<String> {
        self.lock().await.read_line(ReadLimit::Default).await
    }
}

/// A held transaction lock
///
/// Its send/receive primitives never take the lock themselves; holding the
/// guard is what makes them safe to call.
///
/// Sending a command leaves the transaction pending until [`settle`] is
/// called once the last expected line has been read. A guard dropped while
/// pending marks the connection out of step.
///
/// [`settle`]: Transaction::settle
pub struct Transaction<'a> {
    guard: MutexGuard<'a, ConnectionManager>,
    pending: bool,
}

impl Transaction<'_> {
    /// The connection manager, for connect/close/retry inside the transaction
    pub fn manager(&mut self) -> &mut ConnectionManager {
        &mut self.guard
    }

    fn codec(&mut self) -> Result<&mut LineCodec<TcpStream>> {
        self.guard.codec()
    }

    /// Send one command without reading a reply
    pub async fn write_command(&mut self, command: &str) -> Result<()> {
        let result = self.codec()?.write_command(command).await;
        // A rejected argument never reached the wire
        if !matches!(result, Err(Error::InvalidParameter { .. })) {
            self.pending = true;
        }
        result
    }

    /// Whether a command was sent and its reply not yet fully read
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Declare every reply owed on this transaction read
    pub fn settle(&mut self) {
        self.pending = false;
    }

    /// Give up on the connection after a failure left a reply owed
    ///
    /// The socket is closed now and replaced by the next [`Dispatcher::lock`].
    pub async fn abandon(&mut self) {
        if self.pending {
            self.pending = false;
            self.guard.abandon().await;
        }
    }

    /// Read one line, optionally overriding the timeout for this read only
    pub async fn read_line(&mut self, limit: ReadLimit) -> Result<String> {
        self.codec()?.read_line(limit).await
    }

    /// Read a count-prefixed list response
    pub async fn read_list_response(&mut self, limit: ReadLimit) -> Result<String> {
        self.codec()?.read_list_response(limit).await
    }

    async fn write_and_read(&mut self, command: &str) -> Result<String> {
        self.write_command(command).await?;
        if is_list_command(command) {
            self.read_list_response(ReadLimit::Default).await
        } else {
            self.read_line(ReadLimit::Default).await
        }
    }

    /// Write then read, with exactly one reconnect-and-repeat on a network fault
    ///
    /// If the repeat fails too, its error propagates unchanged. Any failure
    /// after the command reached the wire abandons the connection.
    pub async fn exchange(&mut self, command: &str) -> Result<String> {
        let result = match self.write_and_read(command).await {
            Err(e) if e.is_network() => {
                tracing::error!(
                    command = %command.trim_end(),
                    error = %e,
                    "Network error, attempting reconnect and retry"
                );
                self.pending = false;
                self.guard.retry().await?;
                self.write_and_read(command).await
            }
            other => other,
        };

        match result {
            Ok(reply) => {
                self.settle();
                Ok(reply)
            }
            Err(e) => {
                self.abandon().await;
                Err(e)
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.pending {
            self.guard.mark_out_of_step();
        }
        tracing::trace!("Transaction lock released");
    }
}

#[async_trait]
impl<'a> LineChannel for Transaction<'a> {
    async fn send_command(&mut self, command: &str) -> Result<()> {
        self.write_command(command).await
    }

    async fn receive_line(&mut self, limit: ReadLimit) -> Result<String> {
        self.read_line(limit).await
    }
}
