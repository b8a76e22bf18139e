//! The byte channel underneath a cplane session.
//!
//! A recorder link is a plain duplex byte stream. Both directions are
//! bounded by the caller: a peer that stops reading must not wedge a write
//! any more than a silent peer may wedge a read. Expiry in either direction
//! is [`Error::Timeout`](crate::error::Error::Timeout).
//!
//! Framing is not done here. `mark6-cplane` drives `receive` until the `;`
//! terminator shows up. The TCP implementation lives in `mark6-transport`
//! and a scripted one in `mark6-test-harness`.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Bounded, object-safe byte link to one recorder.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write all of `data`, giving up after `timeout`.
    ///
    /// On timeout some prefix of `data` may already be on the wire, so the
    /// link is no longer in a known state.
    async fn send(&mut self, data: &[u8], timeout: Duration) -> Result<()>;

    /// Read whatever is available into `buf`, waiting at most `timeout` for
    /// the first byte. Returns the number of bytes read, never 0.
    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize>;

    /// Release the link. Idempotent; afterwards both directions report
    /// [`Error::NotConnected`](crate::error::Error::NotConnected).
    async fn close(&mut self) -> Result<()>;

    /// `false` once the link has been closed.
    fn is_connected(&self) -> bool;
}
