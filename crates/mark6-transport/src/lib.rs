//! Transport implementations for the Mark6 cplane client.
//!
//! The recorder exposes its control plane on a single TCP port, so
//! [`TcpTransport`] is the only concrete [`Transport`](mark6_core::Transport)
//! shipped here.
//!
//! # Example
//!
//! ```no_run
//! use mark6_transport::TcpTransport;
//! use mark6_core::transport::Transport;
//! use std::time::Duration;
//!
//! # async fn example() -> mark6_core::Result<()> {
//! let mut transport =
//!     TcpTransport::connect_with_timeout("192.168.0.33", 14242, Duration::from_secs(5)).await?;
//!
//! transport.send(b"record?;\n", Duration::from_secs(1)).await?;
//!
//! let mut buf = [0u8; 1024];
//! let n = transport.receive(&mut buf, Duration::from_secs(2)).await?;
//! # Ok(())
//! # }
//! ```

pub mod tcp;

pub use tcp::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, TcpTransport};
