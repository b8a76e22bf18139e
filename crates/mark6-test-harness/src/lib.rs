//! mark6-test-harness: mock transports for the Mark6 cplane client.
//!
//! [`MockTransport`] scripts the recorder in memory for deterministic unit
//! tests of the session and client. [`MockTcpServer`] plays the recorder
//! over real loopback TCP for end-to-end tests of `TcpTransport`.

pub mod mock_tcp;
pub mod mock_transport;

pub use mock_tcp::MockTcpServer;
pub use mock_transport::MockTransport;
