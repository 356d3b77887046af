//! TCP connection management
//!
//! [`ConnectionManager`] owns the single socket to the machine. It opens it
//! with a dedicated connect timeout, closes it without ever failing the
//! caller, and re-opens it with exponential backoff after a transport fault.
//!
//! The manager is not synchronised itself; the [`Dispatcher`](super::Dispatcher)
//! keeps it behind the transaction lock so the socket is never touched
//! concurrently.

use super::codec::LineCodec;
use gravokit_core::{ConnectionError, Error, Result};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

/// Default TCP port of the machine's command session
pub const DEFAULT_PORT: u16 = 55555;

/// Default connection timeout (10 seconds).
///
/// Longer than the operational timeout: the machine's network stack can be
/// slow to accept right after power-up.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default operational read/write timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of reconnection attempts
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Default base delay between reconnection attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Hostname or IP address of the machine
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Timeout for establishing the TCP connection
    pub connect_timeout: Duration,
    /// Operational read/write timeout, `None` blocks indefinitely
    pub timeout: Option<Duration>,
    /// Attempts made by one reconnection cycle
    pub max_reconnect_attempts: u32,
    /// Base delay of the exponential backoff between attempts
    pub reconnect_delay: Duration,
    /// Per-read bound while a marking cycle is running, `None` waits for the
    /// whole cycle
    pub marking_timeout: Option<Duration>,
}

impl ConnectionSettings {
    /// Settings for `host:port` with default timeouts
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: Some(DEFAULT_TIMEOUT),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            marking_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self.reconnect_delay = base_delay;
        self
    }

    pub fn with_marking_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.marking_timeout = timeout;
        self
    }

    /// The `host:port` string used for dialling and logging
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::new("127.0.0.1", DEFAULT_PORT)
    }
}

/// Delay before the next attempt after `attempt` failed: `base * 2^(attempt-1)`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor)
}

/// Owner of the machine socket
#[derive(Debug)]
pub struct ConnectionManager {
    settings: ConnectionSettings,
    codec: Option<LineCodec<TcpStream>>,
    /// A transaction ended with a reply still owed; the stream cannot be trusted
    out_of_step: bool,
}

impl ConnectionManager {
    /// Create a manager; no socket is opened until [`connect`](Self::connect)
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            codec: None,
            out_of_step: false,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.codec.is_some()
    }

    /// Open the TCP connection
    ///
    /// Any previously open socket is released first. On failure nothing is
    /// left open and [`ConnectionError::ConnectFailed`] is returned.
    pub async fn connect(&mut self) -> Result<()> {
        self.close().await;

        let addr = self.settings.addr();
        let connect_timeout = self.settings.connect_timeout;
        tracing::debug!(
            addr = %addr,
            timeout_ms = connect_timeout.as_millis(),
            "Connecting to marking machine"
        );

        let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(&addr)).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::error!(addr = %addr, error = %e, "TCP connection failed");
                return Err(ConnectionError::ConnectFailed {
                    addr,
                    reason: e.to_string(),
                }
                .into());
            }
            Err(_) => {
                tracing::error!(addr = %addr, "TCP connection timed out");
                return Err(ConnectionError::ConnectFailed {
                    addr,
                    reason: format!("timed out after {}ms", connect_timeout.as_millis()),
                }
                .into());
            }
        };

        // Commands are short and each one waits for its reply
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(addr = %addr, error = %e, "Failed to set TCP_NODELAY (continuing anyway)");
        }

        self.codec = Some(LineCodec::new(stream, self.settings.timeout));
        tracing::info!(addr = %addr, "Established connection to marking machine");
        Ok(())
    }

    /// Whether the stream may still carry a reply nobody will read
    pub fn is_out_of_step(&self) -> bool {
        self.out_of_step
    }

    /// Flag the stream as out of step with the commands sent on it
    ///
    /// The socket must be replaced before it is used again.
    pub fn mark_out_of_step(&mut self) {
        if self.codec.is_some() && !self.out_of_step {
            tracing::warn!(addr = %self.settings.addr(), "Reply still in flight, connection out of step");
            self.out_of_step = true;
        }
    }

    /// Drop a socket that is out of step, keeping the flag so it is replaced
    pub async fn abandon(&mut self) {
        self.mark_out_of_step();
        self.shutdown().await;
    }

    /// Release the socket if one is open
    ///
    /// Idempotent. Shutdown errors are logged and swallowed.
    pub async fn close(&mut self) {
        self.out_of_step = false;
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        if let Some(codec) = self.codec.take() {
            let mut stream = codec.into_inner();
            if let Err(e) = stream.shutdown().await {
                tracing::warn!(
                    addr = %self.settings.addr(),
                    error = %e,
                    "Failed to shut down TCP stream (continuing anyway)"
                );
            }
            tracing::info!(addr = %self.settings.addr(), "Closed connection to marking machine");
        }
    }

    /// Reconnect using the configured attempt count and base delay
    pub async fn retry(&mut self) -> Result<()> {
        let attempts = self.settings.max_reconnect_attempts;
        let delay = self.settings.reconnect_delay;
        self.retry_with(attempts, delay).await
    }

    /// Close and reconnect, up to `max_attempts` times
    ///
    /// Sleeps `base_delay * 2^(attempt-1)` after every failed attempt except
    /// the last. Succeeds as soon as one attempt connects.
    pub async fn retry_with(&mut self, max_attempts: u32, base_delay: Duration) -> Result<()> {
        let addr = self.settings.addr();

        for attempt in 1..=max_attempts {
            self.close().await;
            match self.connect().await {
                Ok(()) => {
                    tracing::info!(addr = %addr, attempt, "Reconnected to marking machine");
                    return Ok(());
                }
                Err(e) if attempt < max_attempts => {
                    let delay = backoff_delay(base_delay, attempt);
                    tracing::warn!(
                        addr = %addr,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "Reconnect attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!(addr = %addr, attempt, error = %e, "Final reconnect attempt failed");
                }
            }
        }

        Err(ConnectionError::ReconnectExhausted {
            addr,
            attempts: max_attempts,
        }
        .into())
    }

    /// The open codec, or [`ConnectionError::NotConnected`]
    pub fn codec(&mut self) -> Result<&mut LineCodec<TcpStream>> {
        self.codec
            .as_mut()
            .ok_or(Error::Connection(ConnectionError::NotConnected))
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if self.codec.is_some() {
            tracing::debug!(addr = %self.settings.addr(), "ConnectionManager dropped, closing connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// An address nothing is listening on
    async fn refused_addr() -> (String, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        ("127.0.0.1".to_string(), port)
    }

    #[test]
    fn test_backoff_delay() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(4));
        assert_eq!(backoff_delay(Duration::from_millis(250), 4), Duration::from_secs(2));
    }

    #[test]
    fn test_settings_defaults() {
        let settings = ConnectionSettings::new("192.168.0.211", DEFAULT_PORT);
        assert_eq!(settings.addr(), "192.168.0.211:55555");
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.timeout, Some(Duration::from_secs(5)));
        assert!(settings.connect_timeout > settings.timeout.unwrap());
        assert_eq!(settings.marking_timeout, None);
    }

    #[tokio::test]
    async fn test_connect_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let mut manager = ConnectionManager::new(ConnectionSettings::new("127.0.0.1", port));
        assert!(!manager.is_connected());
        manager.connect().await.unwrap();
        assert!(manager.is_connected());
        assert!(manager.codec().is_ok());

        manager.close().await;
        assert!(!manager.is_connected());
        // Closing twice is harmless
        manager.close().await;
        assert!(!manager.is_connected());

        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_out_of_step_flag() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            let first = listener.accept().await.map(|_| ());
            let second = listener.accept().await.map(|_| ());
            first.and(second)
        });

        let mut manager = ConnectionManager::new(ConnectionSettings::new("127.0.0.1", port));
        // Nothing to be out of step with while closed
        manager.mark_out_of_step();
        assert!(!manager.is_out_of_step());

        manager.connect().await.unwrap();
        manager.abandon().await;
        assert!(!manager.is_connected());
        assert!(manager.is_out_of_step());

        manager.connect().await.unwrap();
        assert!(!manager.is_out_of_step());
        manager.mark_out_of_step();
        manager.close().await;
        assert!(!manager.is_out_of_step());

        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_leaves_no_socket() {
        let (host, port) = refused_addr().await;
        let mut manager = ConnectionManager::new(ConnectionSettings::new(host, port));

        let err = manager.connect().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::ConnectFailed { .. })
        ));
        assert!(!manager.is_connected());
        assert!(matches!(
            manager.codec(),
            Err(Error::Connection(ConnectionError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts_with_backoff() {
        let (host, port) = refused_addr().await;
        let mut manager = ConnectionManager::new(ConnectionSettings::new(host, port));

        let start = std::time::Instant::now();
        let err = manager
            .retry_with(3, Duration::from_millis(40))
            .await
            .unwrap_err();
        let elapsed = start.elapsed();

        assert!(err.to_string().contains("after 3 attempts"));
        match err {
            Error::Connection(ConnectionError::ReconnectExhausted { attempts, .. }) => {
                assert_eq!(attempts, 3)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Slept 40ms then 80ms, and not after the final attempt
        assert!(elapsed >= Duration::from_millis(120));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_first_available_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        let mut manager = ConnectionManager::new(ConnectionSettings::new("127.0.0.1", port));
        let start = std::time::Instant::now();
        manager
            .retry_with(3, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(manager.is_connected());
        assert!(start.elapsed() < Duration::from_secs(5));

        accept.await.unwrap().unwrap();
    }
}
