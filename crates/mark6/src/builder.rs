//! Mark6Builder -- fluent builder for constructing [`Mark6`] clients.
//!
//! Separates configuration from connection so callers can set the port and
//! the connect/write/read bounds before the TCP connection is opened.
//!
//! # Example
//!
//! ```no_run
//! use mark6::Mark6Builder;
//! use std::time::Duration;
//!
//! # async fn example() -> mark6::Result<()> {
//! let mut recorder = Mark6Builder::new("mark6-01")
//!     .read_timeout(Duration::from_secs(1))
//!     .build()
//!     .await?;
//! let state = recorder.get_recording_state().await?;
//! println!("{} {}", state.state, state.scan_name);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use mark6_core::error::{Error, Result};
use mark6_core::transport::Transport;
use mark6_cplane::{FrameLimits, Session, SessionConfig};
use mark6_transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT};

use crate::client::Mark6;

/// Fluent builder for [`Mark6`].
///
/// Only the host is required:
///
/// ```ignore
/// let recorder = Mark6Builder::new("10.0.0.5").build().await?;
/// ```
#[derive(Debug, Clone)]
pub struct Mark6Builder {
    host: String,
    port: u16,
    connect_timeout: Duration,
    limits: FrameLimits,
}

impl Mark6Builder {
    /// Create a builder for the recorder at `host`.
    pub fn new(host: &str) -> Self {
        Mark6Builder {
            host: host.trim().to_string(),
            port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            limits: FrameLimits::default(),
        }
    }

    /// Set the cplane TCP port (default: 14242).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connection timeout (default: 5s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the longest wait for a command to be written (default: 2s).
    ///
    /// Bounds a recorder that has stopped reading its socket.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.limits.write_timeout = timeout;
        self
    }

    /// Set the longest wait for any single read (default: 2s).
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.limits.read_timeout = timeout;
        self
    }

    /// Set the longest wait for a whole response (default: 10s).
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.limits.response_timeout = timeout;
        self
    }

    /// Set the largest accepted response in bytes (default: 64 KiB).
    pub fn max_response_len(mut self, len: usize) -> Self {
        self.limits.max_len = len;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::InvalidParameter("host is required".into()));
        }
        if self.connect_timeout.is_zero()
            || self.limits.write_timeout.is_zero()
            || self.limits.read_timeout.is_zero()
            || self.limits.response_timeout.is_zero()
        {
            return Err(Error::InvalidParameter("timeouts must be non-zero".into()));
        }
        if self.limits.max_len == 0 {
            return Err(Error::InvalidParameter(
                "max_response_len must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Build a [`Mark6`] over a caller-provided transport.
    ///
    /// This is the entry point for tests (pass a `MockTransport` from
    /// `mark6-test-harness`) and for callers that manage the connection
    /// themselves. The port and connect timeout are ignored.
    pub fn build_with_transport(self, transport: Box<dyn Transport>) -> Result<Mark6> {
        self.validate()?;
        Ok(Mark6::new(Session::new(transport, &self.host, self.limits)))
    }

    /// Connect over TCP and build a [`Mark6`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] for an unusable configuration,
    /// [`Error::Connection`] if the recorder cannot be reached.
    pub async fn build(self) -> Result<Mark6> {
        self.validate()?;
        let config = SessionConfig {
            connect_timeout: self.connect_timeout,
            frame: self.limits,
        };
        let session = Session::connect(&self.host, self.port, &config).await?;
        Ok(Mark6::new(session))
    }
}
