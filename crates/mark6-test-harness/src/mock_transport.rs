//! Mock transport for deterministic testing of the cplane session.
//!
//! [`MockTransport`] implements [`Transport`] with pre-loaded
//! request/response pairs. Responses can be delivered in small chunks to
//! exercise partial-read handling in the frame reader.
//!
//! # Example
//!
//! ```
//! use mark6_test_harness::MockTransport;
//!
//! let mut mock = MockTransport::new();
//! mock.expect(b"record?;\n", b"!record?0:0:on:12:exp1_stn_scan12;\n");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;

use mark6_core::error::{Error, Result};
use mark6_core::transport::Transport;

#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes handed back by subsequent `receive()` calls.
    response: Vec<u8>,
}

/// A scripted [`Transport`] for testing without a recorder.
///
/// Expectations are consumed in order. Each `send()` is matched against the
/// next expectation and its response becomes readable. Once the pending
/// response is exhausted, `receive()` reports [`Error::Timeout`], which is
/// what a silent device looks like.
#[derive(Debug)]
pub struct MockTransport {
    expectations: VecDeque<Expectation>,
    /// The response data pending for `receive()` calls.
    pending_response: Option<Vec<u8>>,
    /// How many bytes of the pending response have been read.
    response_cursor: usize,
    /// Upper bound on bytes returned per `receive()`; `None` means "all".
    chunk_size: Option<usize>,
    connected: bool,
    close_calls: usize,
    /// Log of all bytes sent through this transport.
    sent_log: Vec<Vec<u8>>,
}

impl MockTransport {
    /// Create a new mock transport in the connected state.
    pub fn new() -> Self {
        MockTransport {
            expectations: VecDeque::new(),
            pending_response: None,
            response_cursor: 0,
            chunk_size: None,
            connected: true,
            close_calls: 0,
            sent_log: Vec::new(),
        }
    }

    /// Add an expected request/response pair.
    pub fn expect(&mut self, request: &[u8], response: &[u8]) {
        self.expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Deliver responses at most `n` bytes per `receive()` call.
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = Some(n.max(1));
        self
    }

    /// All data sent through this transport, one element per `send()`.
    pub fn sent_data(&self) -> &[Vec<u8>] {
        &self.sent_log
    }

    /// Number of expectations not yet consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.expectations.len()
    }

    /// How many times `close()` has been called.
    pub fn close_calls(&self) -> usize {
        self.close_calls
    }

    /// Force the connected state.
    ///
    /// When `false`, `send()` and `receive()` return [`Error::NotConnected`].
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8], _timeout: Duration) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        self.sent_log.push(data.to_vec());

        let Some(expectation) = self.expectations.pop_front() else {
            return Err(Error::Transport(
                "no more expectations in mock transport".into(),
            ));
        };
        if data != expectation.request.as_slice() {
            return Err(Error::Transport(format!(
                "unexpected send data: expected {:?}, got {:?}",
                String::from_utf8_lossy(&expectation.request),
                String::from_utf8_lossy(data)
            )));
        }
        self.pending_response = Some(expectation.response);
        self.response_cursor = 0;
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        if !self.connected {
            return Err(Error::NotConnected);
        }

        let Some(response) = self.pending_response.as_ref() else {
            return Err(Error::Timeout);
        };
        let remaining = &response[self.response_cursor..];
        if remaining.is_empty() {
            self.pending_response = None;
            self.response_cursor = 0;
            return Err(Error::Timeout);
        }

        let limit = self.chunk_size.unwrap_or(usize::MAX);
        let n = remaining.len().min(buf.len()).min(limit);
        buf[..n].copy_from_slice(&remaining[..n]);
        self.response_cursor += n;
        if self.response_cursor >= response.len() {
            self.pending_response = None;
            self.response_cursor = 0;
        }
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls += 1;
        self.connected = false;
        self.pending_response = None;
        self.response_cursor = 0;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
