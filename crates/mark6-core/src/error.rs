//! Error types for the Mark6 cplane client.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Connection, transport, framing, parse
//! and field-decode failures are all captured here.
//!
//! Transport implementations report raw link failures ([`Error::Timeout`],
//! [`Error::ConnectionLost`], [`Error::Io`], ...). The session layer wraps
//! those into [`Error::Comm`] together with the device host so callers see a
//! single "communication with this recorder failed" category while the
//! original cause stays reachable through [`std::error::Error::source`].

/// The error type for all Mark6 client operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Establishing the TCP connection failed (refused, timed out, DNS).
    #[error("failed to connect to {addr}: {reason}")]
    Connection {
        /// The `host:port` we attempted to reach.
        addr: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A send or receive on an established connection failed.
    ///
    /// The connection should be considered unusable after this error.
    #[error("communication error with {host}: {source}")]
    Comm {
        /// The device host the session targets.
        host: String,
        /// The underlying transport failure.
        #[source]
        source: Box<Error>,
    },

    /// The response terminator never arrived within the size or time bound.
    #[error("framing error: {0}")]
    Framing(String),

    /// The response text carried no query/command marker or no status codes.
    #[error("parse error: {0}")]
    Parse(String),

    /// A field at a fixed position had the wrong arity or an untypeable value.
    #[error(transparent)]
    FieldDecode(#[from] FieldDecodeError),

    /// The device answered with a cplane code the caller treats as failure.
    #[error("device rejected {command}: cplane code {code}")]
    Device {
        /// Base command of the rejected response.
        command: String,
        /// The cplane return code as sent by the device.
        code: String,
    },

    /// An invalid parameter was passed to a client operation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A transport-level error without a more specific category.
    #[error("transport error: {0}")]
    Transport(String),

    /// Timed out waiting for data from the device.
    #[error("timeout waiting for response")]
    Timeout,

    /// No connection to the device has been established, or it was closed.
    #[error("not connected")]
    NotConnected,

    /// The connection to the device was lost unexpectedly.
    #[error("connection lost")]
    ConnectionLost,

    /// An underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap a link-level failure as [`Error::Comm`] for `host`.
    ///
    /// Errors that already carry their own category (connection, framing,
    /// parse, field decode, device, or an existing `Comm`) are returned
    /// unchanged so a cause is never wrapped twice.
    pub fn comm(host: &str, err: Error) -> Error {
        match err {
            Error::Timeout
            | Error::NotConnected
            | Error::ConnectionLost
            | Error::Transport(_)
            | Error::Io(_) => Error::Comm {
                host: host.to_string(),
                source: Box::new(err),
            },
            other => other,
        }
    }

    /// Whether this error leaves the connection unusable until reconnect.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Error::Comm { .. }
                | Error::Framing(_)
                | Error::Connection { .. }
                | Error::ConnectionLost
                | Error::NotConnected
        )
    }
}

/// A value at a fixed field position could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{command}: field `{field}` {reason}")]
pub struct FieldDecodeError {
    /// Command family whose schema was being applied (e.g. `"mstat"`).
    pub command: String,
    /// Name of the field within that schema.
    pub field: String,
    /// What went wrong, including the offending value when there is one.
    pub reason: String,
}

impl FieldDecodeError {
    /// Build a decode error for `field` of `command`.
    pub fn new(command: &str, field: &str, reason: impl Into<String>) -> Self {
        FieldDecodeError {
            command: command.to_string(),
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
