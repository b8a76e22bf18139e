//! Bounded read-until-terminator for cplane responses.
//!
//! The protocol has no length prefix: a response ends at the first `;`
//! followed only by line-ending whitespace. [`read_frame`] accumulates
//! chunks from a [`Transport`] until that terminator appears, and gives up
//! once either the size cap or the whole-response deadline is exceeded.

use std::time::Duration;

use mark6_core::error::{Error, Result};
use mark6_core::transport::Transport;
use tokio::time::Instant;

use crate::protocol;

/// Bytes requested from the transport per read.
const READ_CHUNK: usize = 1024;

/// Size and time bounds for one command/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLimits {
    /// Longest wait for the whole command to be written. Exceeding it is a
    /// transport timeout: the device stopped reading.
    pub write_timeout: Duration,
    /// Longest wait for any single chunk. Exceeding it is a transport
    /// timeout: the device went silent.
    pub read_timeout: Duration,
    /// Longest wait for the whole response. Exceeding it is a framing
    /// error: data kept coming (or stopped) without a terminator.
    pub response_timeout: Duration,
    /// Largest response accepted, in bytes.
    pub max_len: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        FrameLimits {
            write_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(10),
            max_len: 64 * 1024,
        }
    }
}

/// Read one complete response from `transport`.
///
/// Returns every byte received up to and including the terminator line.
///
/// # Errors
///
/// - [`Error::Framing`] if the buffer grows past `max_len`, or the deadline
///   passes, before the terminator arrives.
/// - Transport errors ([`Error::Timeout`] when a single read stalls for
///   `read_timeout`, [`Error::ConnectionLost`], ...) are returned unchanged.
pub async fn read_frame(transport: &mut dyn Transport, limits: &FrameLimits) -> Result<Vec<u8>> {
    let deadline = Instant::now() + limits.response_timeout;
    let mut recv_buf = [0u8; READ_CHUNK];
    let mut frame = Vec::new();

    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(deadline_exceeded(limits, frame.len()));
        }
        let wait = limits.read_timeout.min(deadline - now);

        match transport.receive(&mut recv_buf, wait).await {
            Ok(n) => {
                frame.extend_from_slice(&recv_buf[..n]);

                if frame.len() > limits.max_len {
                    tracing::warn!(
                        len = frame.len(),
                        max_len = limits.max_len,
                        "response exceeds size limit"
                    );
                    return Err(Error::Framing(format!(
                        "no terminator within {} bytes",
                        limits.max_len
                    )));
                }

                if protocol::is_frame_complete(&frame) {
                    return Ok(frame);
                }
            }
            Err(Error::Timeout) if Instant::now() >= deadline => {
                return Err(deadline_exceeded(limits, frame.len()));
            }
            Err(e) => return Err(e),
        }
    }
}

fn deadline_exceeded(limits: &FrameLimits, buffered: usize) -> Error {
    tracing::warn!(
        buffered,
        timeout_ms = limits.response_timeout.as_millis(),
        "response deadline passed without terminator"
    );
    Error::Framing(format!(
        "no terminator within {} ms ({buffered} bytes buffered)",
        limits.response_timeout.as_millis()
    ))
}
