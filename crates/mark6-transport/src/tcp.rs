//! TCP transport for the recorder's cplane port.
//!
//! [`TcpTransport`] implements [`Transport`] over a `tokio` [`TcpStream`].
//! Every operation is individually bounded: connect carries its own timeout
//! and each `receive` takes a timeout from the caller. Writes go out whole
//! via `write_all` and are flushed immediately.

use async_trait::async_trait;
use mark6_core::error::{Error, Result};
use mark6_core::transport::Transport;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// The recorder's cplane control port.
pub const DEFAULT_PORT: u16 = 14242;

/// Connect timeout used by [`TcpTransport::connect`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP transport to a recorder.
///
/// The connection is established eagerly via
/// [`connect`](TcpTransport::connect) or
/// [`connect_with_timeout`](TcpTransport::connect_with_timeout). Dropping the
/// transport closes the socket.
#[derive(Debug)]
pub struct TcpTransport {
    /// `None` once closed.
    stream: Option<TcpStream>,
    /// `host:port` for logging.
    addr: String,
}

impl TcpTransport {
    /// Connect to `host` on `port` using the default timeout.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_timeout(host, port, DEFAULT_CONNECT_TIMEOUT).await
    }

    /// Connect to `host` on `port`, giving up after `timeout`.
    ///
    /// Refusal, timeout and name-resolution failures all surface as
    /// [`Error::Connection`].
    pub async fn connect_with_timeout(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        tracing::debug!(
            addr = %addr,
            timeout_ms = timeout.as_millis(),
            "connecting to cplane port"
        );

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr.as_str()))
            .await
            .map_err(|_| {
                tracing::error!(addr = %addr, "cplane connect timed out");
                Error::Connection {
                    addr: addr.clone(),
                    reason: format!("timed out after {} ms", timeout.as_millis()),
                }
            })?
            .map_err(|e| {
                tracing::error!(addr = %addr, error = %e, "cplane connect failed");
                map_connect_error(e, &addr)
            })?;

        // Commands are a few bytes each; do not let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::warn!(
                addr = %addr,
                error = %e,
                "could not disable Nagle; commands may be delayed"
            );
        }

        tracing::info!(addr = %addr, "connected to recorder");

        Ok(Self {
            stream: Some(stream),
            addr,
        })
    }

    /// Wrap an already-connected `TcpStream`.
    ///
    /// `addr` is only used as a label in logs.
    pub fn from_stream(stream: TcpStream, addr: String) -> Self {
        tracing::debug!(addr = %addr, "adopting connected stream");
        Self {
            stream: Some(stream),
            addr,
        }
    }

    /// The `host:port` this transport was connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, data: &[u8], timeout: Duration) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        tracing::trace!(
            addr = %self.addr,
            bytes = data.len(),
            data = %String::from_utf8_lossy(data).trim_end(),
            "tx"
        );

        let write = async {
            stream.write_all(data).await?;
            stream.flush().await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "write to recorder failed");
                Err(map_io_error(e))
            }
            Err(_) => {
                // The recorder stopped draining its socket.
                tracing::warn!(
                    addr = %self.addr,
                    bytes = data.len(),
                    timeout_ms = timeout.as_millis(),
                    "write timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match tokio::time::timeout(timeout, stream.read(buf)).await {
            Ok(Ok(0)) => {
                // 0 bytes read: the peer closed its end.
                tracing::warn!(addr = %self.addr, "recorder closed the connection");
                Err(Error::ConnectionLost)
            }
            Ok(Ok(n)) => {
                tracing::trace!(
                    addr = %self.addr,
                    bytes = n,
                    data = %String::from_utf8_lossy(&buf[..n]).trim_end(),
                    "rx"
                );
                Ok(n)
            }
            Ok(Err(e)) => {
                tracing::error!(addr = %self.addr, error = %e, "read from recorder failed");
                Err(map_io_error(e))
            }
            Err(_) => {
                tracing::debug!(
                    addr = %self.addr,
                    timeout_ms = timeout.as_millis(),
                    "read timed out"
                );
                Err(Error::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!(addr = %self.addr, "shutting down cplane socket");

            if let Err(e) = stream.shutdown().await {
                tracing::warn!(
                    addr = %self.addr,
                    error = %e,
                    "socket shutdown failed"
                );
            }

            tracing::info!(addr = %self.addr, "cplane socket closed");
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if self.stream.is_some() {
            // The socket itself is closed when `stream` drops right after this.
            tracing::debug!(addr = %self.addr, "transport dropped while connected");
        }
    }
}

/// Map a connect-time I/O error to [`Error::Connection`].
fn map_connect_error(e: std::io::Error, addr: &str) -> Error {
    let reason = match e.kind() {
        std::io::ErrorKind::ConnectionRefused => "connection refused".to_string(),
        _ => e.to_string(),
    };
    Error::Connection {
        addr: addr.to_string(),
        reason,
    }
}

/// Map a data-path I/O error to the appropriate [`Error`] variant.
fn map_io_error(e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::BrokenPipe
        | std::io::ErrorKind::NotConnected
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::WriteZero => Error::ConnectionLost,
        _ => Error::Io(e),
    }
}
