//! One cplane connection with at most one command in flight.
//!
//! [`Session`] owns the [`Transport`] behind a `tokio::sync::Mutex`. Each
//! [`send_command`](Session::send_command) holds the lock from send until
//! the full response has been read, so concurrent callers queue up and a
//! response is always paired with the request that produced it.
//!
//! Link failures are reported as [`Error::Comm`] carrying the recorder host.
//! After a connection-fatal error the transport is closed; later commands
//! fail fast until the caller builds a new session.

use std::time::Duration;

use mark6_core::error::{Error, Result};
use mark6_core::transport::Transport;
use mark6_core::types::Response;
use mark6_transport::{DEFAULT_CONNECT_TIMEOUT, TcpTransport};
use tokio::sync::Mutex;
use tracing::{debug, info, trace};

use crate::frame::{self, FrameLimits};
use crate::protocol;

/// Connection and framing parameters for a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Upper bound on TCP connection establishment.
    pub connect_timeout: Duration,
    /// Per-response read bounds.
    pub frame: FrameLimits,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            frame: FrameLimits::default(),
        }
    }
}

/// A request/response channel to one recorder.
pub struct Session {
    transport: Mutex<Box<dyn Transport>>,
    host: String,
    limits: FrameLimits,
}

impl Session {
    /// Open a TCP connection to `host:port`.
    ///
    /// # Errors
    ///
    /// [`Error::Connection`] if the connection cannot be established within
    /// `config.connect_timeout`.
    pub async fn connect(host: &str, port: u16, config: &SessionConfig) -> Result<Self> {
        let transport = TcpTransport::connect_with_timeout(host, port, config.connect_timeout).await?;
        info!(host, port, "cplane session opened");
        Ok(Self::new(Box::new(transport), host, config.frame))
    }

    /// Wrap an already-connected transport.
    pub fn new(transport: Box<dyn Transport>, host: &str, limits: FrameLimits) -> Self {
        Session {
            transport: Mutex::new(transport),
            host: host.to_string(),
            limits,
        }
    }

    /// The recorder host this session talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The read bounds applied to every response.
    pub fn limits(&self) -> FrameLimits {
        self.limits
    }

    /// Send one command and return its parsed response.
    ///
    /// The command is normalised (`;` and `\n` appended if missing) before it
    /// is written. Non-zero cplane/dplane codes are not errors here; see
    /// [`Response::ensure_ok`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] for an empty command or one with an
    ///   embedded terminator.
    /// - [`Error::Comm`] if the write fails, or the device stops reading or
    ///   stops answering within the limits.
    /// - [`Error::Framing`] if no terminator arrives within the limits.
    /// - [`Error::Parse`] if the response is malformed.
    pub async fn send_command(&self, command: &str) -> Result<Response> {
        let body = protocol::command_body(command);
        if body.is_empty() {
            return Err(Error::InvalidParameter("empty command".into()));
        }
        if body.contains([';', '\n', '\r']) {
            return Err(Error::InvalidParameter(format!(
                "command contains an embedded terminator: {body:?}"
            )));
        }
        let wire = protocol::normalize_command(body);

        let mut transport = self.transport.lock().await;
        debug!(host = %self.host, command = body, "sending cplane command");

        let raw = match self.exchange(&mut **transport, &wire).await {
            Ok(raw) => raw,
            Err(e) => {
                if e.is_connection_fatal() && transport.is_connected() {
                    debug!(host = %self.host, error = %e, "closing session after fatal error");
                    if let Err(close_err) = transport.close().await {
                        tracing::warn!(host = %self.host, error = %close_err, "close failed");
                    }
                }
                return Err(e);
            }
        };
        drop(transport);

        let response = protocol::parse_response(&raw)?;
        debug!(
            command = %response.base_command,
            cplane = %response.cplane_code,
            dplane = %response.dplane_code,
            fields = response.fields.len(),
            "cplane response"
        );
        Ok(response)
    }

    async fn exchange(&self, transport: &mut dyn Transport, wire: &[u8]) -> Result<Vec<u8>> {
        trace!(bytes = ?String::from_utf8_lossy(wire), "tx");
        transport
            .send(wire, self.limits.write_timeout)
            .await
            .map_err(|e| Error::comm(&self.host, e))?;
        let raw = frame::read_frame(transport, &self.limits)
            .await
            .map_err(|e| Error::comm(&self.host, e))?;
        trace!(bytes = ?String::from_utf8_lossy(&raw), "rx");
        Ok(raw)
    }

    /// Whether the underlying transport is still open.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    /// Close the connection. Closing twice is a no-op.
    pub async fn close(&self) -> Result<()> {
        let mut transport = self.transport.lock().await;
        if transport.is_connected() {
            info!(host = %self.host, "closing cplane session");
            transport.close().await?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.transport.get_mut().is_connected() {
            debug!(host = %self.host, "session dropped, releasing connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mark6_core::types::ResponseType;
    use mark6_test_harness::{MockTcpServer, MockTransport};

    fn limits() -> FrameLimits {
        FrameLimits {
            write_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(100),
            response_timeout: Duration::from_millis(500),
            max_len: 4096,
        }
    }

    fn session(mock: MockTransport) -> Session {
        Session::new(Box::new(mock), "recorder1", limits())
    }

    #[tokio::test]
    async fn send_command_round_trip() {
        let mut mock = MockTransport::new();
        mock.expect(b"record?;\n", b"!record?0:0:on:12:exp1_stn_scan12;\n");
        let s = session(mock);

        let r = s.send_command("record?").await.unwrap();
        assert_eq!(r.base_command, "record");
        assert_eq!(r.response_type, ResponseType::Query);
        assert_eq!(r.fields, vec!["on", "12", "exp1_stn_scan12"]);
    }

    #[tokio::test]
    async fn command_is_normalised_once() {
        let mut mock = MockTransport::new();
        mock.expect(b"list?;\n", b"!list?0:0:0:0;\n");
        let s = session(mock);

        s.send_command(" list?;\n").await.unwrap();
    }

    #[tokio::test]
    async fn chunked_response_is_reassembled() {
        let mut mock = MockTransport::new().with_chunk_size(5);
        mock.expect(
            b"mstat?2;\n",
            b"!mstat?2=0:0:-:2:-:0:0:-:-:unknown:-:-;\n",
        );
        let s = session(mock);

        let r = s.send_command("mstat?2").await.unwrap();
        assert_eq!(r.echo_args.as_deref(), Some("2"));
        assert_eq!(r.fields.len(), 10);
    }

    #[tokio::test]
    async fn rejects_bad_commands() {
        let s = session(MockTransport::new());
        assert!(matches!(
            s.send_command("  ").await,
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            s.send_command("list?;record?").await,
            Err(Error::InvalidParameter(_))
        ));
    }

    #[tokio::test]
    async fn stalled_device_is_comm_error_and_closes() {
        let mut mock = MockTransport::new();
        mock.expect(b"list?;\n", b"!list?0:0");
        let s = session(mock);

        let err = s.send_command("list?").await.unwrap_err();
        match &err {
            Error::Comm { host, source } => {
                assert_eq!(host, "recorder1");
                assert!(matches!(**source, Error::Timeout));
            }
            other => panic!("expected Comm, got {other:?}"),
        }
        assert!(err.to_string().contains("recorder1"));
        assert!(!s.is_connected().await);

        // The next command fails fast on the closed link.
        match s.send_command("list?").await {
            Err(Error::Comm { source, .. }) => {
                assert!(matches!(*source, Error::NotConnected))
            }
            other => panic!("expected Comm, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_response_is_framing_error() {
        let mut mock = MockTransport::new().with_chunk_size(512);
        mock.expect(b"list?;\n", &[b'0'; 8192]);
        let s = session(mock);

        let err = s.send_command("list?").await.unwrap_err();
        assert!(matches!(err, Error::Framing(_)), "got {err:?}");
        assert!(!s.is_connected().await);
    }

    #[tokio::test]
    async fn malformed_response_is_parse_error_and_keeps_link() {
        let mut mock = MockTransport::new();
        mock.expect(b"record?;\n", b"!garbage;\n");
        let s = session(mock);

        let err = s.send_command("record?").await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got {err:?}");
        assert!(s.is_connected().await);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let s = session(MockTransport::new());
        s.close().await.unwrap();
        s.close().await.unwrap();
        assert!(!s.is_connected().await);
    }

    #[tokio::test]
    async fn over_tcp_with_split_response() {
        let mut server = MockTcpServer::new().await.unwrap();
        server.expect_chunked(
            b"record?;\n",
            &[&b"!record?0:0:o"[..], &b"n:12:exp1"[..], &b"_stn_scan12;\n"[..]],
        );
        server.start();

        let s = Session::connect("127.0.0.1", server.port(), &SessionConfig::default())
            .await
            .unwrap();
        let r = s.send_command("record?").await.unwrap();
        assert_eq!(r.fields[2], "exp1_stn_scan12");

        s.close().await.unwrap();
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_commands_are_serialised() {
        let mut server = MockTcpServer::new().await.unwrap();
        server.set_chunk_delay(Duration::from_millis(30));
        server.expect_chunked(
            b"record?;\n",
            &[&b"!record?0:0:"[..], &b"on:12:"[..], &b"exp1_stn_scan12;\n"[..]],
        );
        server.expect_chunked(
            b"list?;\n",
            &[&b"!list?=0:0:"[..], &b"0:0;\n"[..]],
        );
        server.start();

        let s = Session::connect("127.0.0.1", server.port(), &SessionConfig::default())
            .await
            .unwrap();
        let (record, list) = tokio::join!(s.send_command("record?"), s.send_command("list?"));

        let record = record.unwrap();
        assert_eq!(record.base_command, "record");
        assert_eq!(record.fields, vec!["on", "12", "exp1_stn_scan12"]);
        let list = list.unwrap();
        assert_eq!(list.base_command, "list");
        assert_eq!(list.fields, vec!["0", "0"]);

        // The server fails if the second request arrives mid-response.
        s.close().await.unwrap();
        server.wait().await.unwrap();
    }

    #[tokio::test]
    async fn stalled_write_is_comm_timeout_and_closes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let config = SessionConfig {
            connect_timeout: Duration::from_secs(1),
            frame: FrameLimits {
                write_timeout: Duration::from_millis(200),
                read_timeout: Duration::from_millis(200),
                response_timeout: Duration::from_secs(1),
                max_len: 4096,
            },
        };
        let s = Session::connect("127.0.0.1", port, &config).await.unwrap();

        let command = format!("record=on:{}:exp:st", "x".repeat(64 * 1024 * 1024));
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(Duration::from_secs(5), s.send_command(&command))
            .await
            .expect("send_command must honour the write timeout");

        match result {
            Err(Error::Comm { host, source }) => {
                assert_eq!(host, "127.0.0.1");
                assert!(matches!(*source, Error::Timeout), "got {source:?}");
            }
            other => panic!("expected Comm, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!s.is_connected().await);

        server.abort();
    }

    #[tokio::test]
    async fn connect_refused_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = Session::connect("127.0.0.1", port, &SessionConfig::default()).await;
        assert!(matches!(result, Err(Error::Connection { .. })));
    }
}
