//! Mock TCP recorder for end-to-end testing.
//!
//! [`MockTcpServer`] listens on a random loopback port, accepts one client
//! and answers scripted requests in order. Responses can be split into
//! several writes with a pause between them so the client sees the frame
//! arrive in pieces, as it does from a real recorder under load. A request
//! that shows up while a multi-chunk response is still being written fails
//! the script, which catches clients that pipeline commands.
//!
//! # Example
//!
//! ```
//! use mark6_test_harness::MockTcpServer;
//!
//! # async fn example() -> mark6_core::Result<()> {
//! let mut server = MockTcpServer::new().await?;
//! server.expect(b"record?;\n", b"!record?0:0:off:0:none;\n");
//! server.start();
//!
//! let port = server.port();
//! // ... connect a TcpTransport to 127.0.0.1:port and test ...
//! # Ok(())
//! # }
//! ```

use mark6_core::error::{Error, Result};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
struct TcpExpectation {
    /// The exact bytes we expect the client to send.
    request: Vec<u8>,
    /// Written back in order, one `write_all` per chunk.
    response_chunks: Vec<Vec<u8>>,
}

/// A scripted recorder on loopback TCP.
///
/// If the client sends data that does not match the next expectation, the
/// server task ends with an error describing the mismatch, which
/// [`wait`](MockTcpServer::wait) reports.
pub struct MockTcpServer {
    listener: Option<TcpListener>,
    port: u16,
    expectations: Vec<TcpExpectation>,
    chunk_delay: Duration,
    server_handle: Option<JoinHandle<std::result::Result<(), String>>>,
}

impl MockTcpServer {
    /// Bind a new mock server on a random loopback port.
    ///
    /// The listener is bound immediately, so clients may connect before
    /// [`start`](MockTcpServer::start); the connection is accepted once the
    /// server task runs.
    pub async fn new() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| Error::Transport(format!("failed to bind mock TCP server: {e}")))?;
        let port = listener.local_addr().map_err(Error::Io)?.port();

        Ok(Self {
            listener: Some(listener),
            port,
            expectations: Vec::new(),
            chunk_delay: Duration::from_millis(20),
            server_handle: None,
        })
    }

    /// Answer `request` with `response` in a single write.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expect_chunked(request, &[response]);
    }

    /// Answer `request` with each chunk written separately.
    pub fn expect_chunked(&mut self, request: &[u8], chunks: &[&[u8]]) {
        self.expectations.push(TcpExpectation {
            request: request.to_vec(),
            response_chunks: chunks.iter().map(|c| c.to_vec()).collect(),
        });
    }

    /// Pause between response chunks (default 20ms).
    pub fn set_chunk_delay(&mut self, delay: Duration) {
        self.chunk_delay = delay;
    }

    /// The loopback port the server listens on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `127.0.0.1:<port>`.
    pub fn addr(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Spawn the server task: accept one client and play all expectations.
    ///
    /// After the last expectation the connection is dropped.
    pub fn start(&mut self) {
        let Some(listener) = self.listener.take() else {
            tracing::warn!(port = self.port, "mock TCP server already started");
            return;
        };
        let expectations = std::mem::take(&mut self.expectations);
        let chunk_delay = self.chunk_delay;

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener
                .accept()
                .await
                .map_err(|e| format!("failed to accept connection: {e}"))?;

            for (i, expectation) in expectations.iter().enumerate() {
                let mut buf = vec![0u8; expectation.request.len()];
                let mut total_read = 0;

                while total_read < expectation.request.len() {
                    let n = stream
                        .read(&mut buf[total_read..])
                        .await
                        .map_err(|e| format!("expectation {i}: read error: {e}"))?;
                    if n == 0 {
                        return Err(format!(
                            "expectation {i}: client disconnected after {total_read} bytes (expected {})",
                            expectation.request.len()
                        ));
                    }
                    total_read += n;
                }

                if buf != expectation.request {
                    return Err(format!(
                        "expectation {i}: request mismatch: expected {:?}, got {:?}",
                        String::from_utf8_lossy(&expectation.request),
                        String::from_utf8_lossy(&buf)
                    ));
                }

                for (c, chunk) in expectation.response_chunks.iter().enumerate() {
                    if c > 0 {
                        tokio::time::sleep(chunk_delay).await;
                        // A client must wait for the whole response before
                        // sending its next request.
                        let mut early = [0u8; 64];
                        if let Ok(n @ 1..) = stream.try_read(&mut early) {
                            return Err(format!(
                                "expectation {i}: {n} bytes of a new request arrived before the response completed: {:?}",
                                String::from_utf8_lossy(&early[..n])
                            ));
                        }
                    }
                    stream
                        .write_all(chunk)
                        .await
                        .map_err(|e| format!("expectation {i}: write error: {e}"))?;
                    stream
                        .flush()
                        .await
                        .map_err(|e| format!("expectation {i}: flush error: {e}"))?;
                }
            }

            Ok(())
        });

        self.server_handle = Some(handle);
    }

    /// Wait for the server task and report any scripted-exchange failure.
    pub async fn wait(self) -> std::result::Result<(), String> {
        match self.server_handle {
            Some(handle) => handle
                .await
                .map_err(|e| format!("server task panicked: {e}"))?,
            None => Ok(()),
        }
    }
}
