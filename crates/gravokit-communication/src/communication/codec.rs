//! Line framing for the marking protocol
//!
//! Requests are ASCII command lines terminated by CR. Replies are lines
//! terminated by CR LF (a bare LF is also accepted). List-class replies start
//! with a decimal item count followed by exactly that many item lines.

use super::{LineChannel, ReadLimit};
use async_trait::async_trait;
use gravokit_core::{Error, Result};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Request terminator
pub const CR: char = '\r';

/// Line codec over an async byte stream
///
/// Reads are buffered; writes go straight to the underlying stream.
#[derive(Debug)]
pub struct LineCodec<S> {
    inner: BufReader<S>,
    /// Operational timeout for reads and writes, `None` blocks indefinitely
    timeout: Option<Duration>,
}

impl<S> LineCodec<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a stream with the given operational timeout
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        Self {
            inner: BufReader::new(stream),
            timeout,
        }
    }

    /// The configured operational timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Replace the configured operational timeout
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn get_ref(&self) -> &S {
        self.inner.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut S {
        self.inner.get_mut()
    }

    /// Unwrap the stream, discarding any buffered but unread bytes
    pub fn into_inner(self) -> S {
        self.inner.into_inner()
    }

    /// Read one line, stripping LF and a trailing CR
    ///
    /// Fails with [`Error::ConnectionClosed`] if the peer closes the stream
    /// before a line feed arrives, and with [`Error::Protocol`] if the line
    /// is not ASCII (the line is still consumed).
    pub async fn read_line(&mut self, limit: ReadLimit) -> Result<String> {
        let deadline = limit.resolve(self.timeout);
        let mut buf = Vec::new();
        let read = with_deadline(deadline, "read", self.inner.read_until(b'\n', &mut buf)).await?;

        if read == 0 || buf.last() != Some(&b'\n') {
            tracing::warn!(partial = buf.len(), "Peer closed the stream mid-read");
            return Err(Error::ConnectionClosed);
        }

        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }

        let line = String::from_utf8(buf)
            .ok()
            .filter(|line| line.is_ascii())
            .ok_or_else(|| Error::protocol("reply is not ASCII"))?;
        tracing::trace!(line = %line, "Received line");
        Ok(line)
    }

    /// Send a command, appending CR if the caller did not supply one
    pub async fn write_command(&mut self, command: &str) -> Result<()> {
        if !command.is_ascii() {
            return Err(Error::invalid_parameter(format!(
                "command is not ASCII: {:?}",
                command
            )));
        }

        let mut wire = String::with_capacity(command.len() + 1);
        wire.push_str(command);
        if !wire.ends_with(CR) {
            wire.push(CR);
        }

        tracing::trace!(command = %wire.trim_end(), bytes = wire.len(), "Sending command");

        let deadline = self.timeout;
        let stream = self.inner.get_mut();
        with_deadline(deadline, "write", async {
            stream.write_all(wire.as_bytes()).await?;
            stream.flush().await
        })
        .await
    }

    /// Read a list-class reply
    ///
    /// The first line is the item count. If it is not a non-negative integer
    /// it is returned unchanged and nothing else is read; this is how an `ER`
    /// line surfaces from a list command. Otherwise the count line and the
    /// items are joined with `\n`, in order.
    pub async fn read_list_response(&mut self, limit: ReadLimit) -> Result<String> {
        let header = self.read_line(limit).await?;
        let count = match header.trim().parse::<usize>() {
            Ok(count) => count,
            Err(_) => {
                tracing::debug!(header = %header, "List header is not a count, passing through");
                return Ok(header);
            }
        };

        let mut lines = Vec::with_capacity(count + 1);
        lines.push(header);
        for _ in 0..count {
            lines.push(self.read_line(limit).await?);
        }

        tracing::debug!(items = count, "Read list response");
        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl<S> LineChannel for LineCodec<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_command(&mut self, command: &str) -> Result<()> {
        self.write_command(command).await
    }

    async fn receive_line(&mut self, limit: ReadLimit) -> Result<String> {
        self.read_line(limit).await
    }
}

/// Run an I/O future under an optional deadline, classifying its failure
async fn with_deadline<T, F>(deadline: Option<Duration>, op: &str, fut: F) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    let result = match deadline {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            Error::network(format!("{} timed out after {}ms", op, limit.as_millis()))
        })?,
        None => fut.await,
    };
    result.map_err(|e| map_io_error(e, op))
}

/// Map a data-path I/O error to the appropriate [`Error`] variant
pub(crate) fn map_io_error(e: io::Error, op: &str) -> Error {
    match e.kind() {
        io::ErrorKind::TimedOut
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => Error::network(format!("{} failed: {}", op, e)),
        io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
        _ => Error::Io(e),
    }
}
