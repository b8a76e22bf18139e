//! mark6-core: Core traits, types, and error definitions for the Mark6
//! cplane client.
//!
//! # Key types
//!
//! - [`Transport`] -- byte-level communication channel
//! - [`Response`] -- one parsed cplane response
//! - [`ModuleStatus`], [`ScanRecord`], [`RecordingState`], [`InputStream`]
//!   -- typed records decoded from responses
//! - [`Error`] / [`Result`] -- error handling

pub mod error;
pub mod transport;
pub mod types;

pub use error::{Error, FieldDecodeError, Result};
pub use transport::Transport;
pub use types::*;
