use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use crate::protocol::error::{KrpcError, Result};
use crate::transport::record::{read_record, write_record};

/// Synchronous TCP transport used by the client.
///
/// Provides blocking connect/send/receive over record-marked streams. Without
/// a timeout, a round trip blocks until the peer answers or the connection
/// drops.
///
/// # Example
///
/// ```no_run
/// use krpc_common::transport::TcpTransport;
///
/// let transport = TcpTransport::new();
/// let mut stream = transport.connect("127.0.0.1:2049".parse().unwrap()).unwrap();
/// let reply = transport.round_trip(&mut stream, b"...", 1024).unwrap();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport {
    timeout: Option<Duration>,
}

impl TcpTransport {
    /// Creates a transport whose operations never time out.
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Creates a transport that bounds connect, read and write by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Connects to a remote endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or timeouts cannot be set on
    /// the stream.
    pub fn connect(&self, addr: SocketAddr) -> Result<TcpStream> {
        let stream = match self.timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        }
        .map_err(|e| KrpcError::Connection(format!("Failed to connect to {}: {}", addr, e)))?;

        stream
            .set_read_timeout(self.timeout)
            .map_err(|e| KrpcError::Connection(format!("Failed to set read timeout: {}", e)))?;
        stream
            .set_write_timeout(self.timeout)
            .map_err(|e| KrpcError::Connection(format!("Failed to set write timeout: {}", e)))?;
        stream
            .set_nodelay(true)
            .map_err(|e| KrpcError::Connection(format!("Failed to set nodelay: {}", e)))?;

        Ok(stream)
    }

    /// Sends one request record and waits for one reply record of at most
    /// `max_reply` bytes.
    pub fn round_trip(
        &self,
        stream: &mut TcpStream,
        request: &[u8],
        max_reply: usize,
    ) -> Result<Vec<u8>> {
        self.send_message(stream, request)?;
        self.receive_message(stream, max_reply)?
            .ok_or_else(|| KrpcError::Connection("Connection closed by peer".to_string()))
    }

    pub fn send_message(&self, stream: &mut TcpStream, data: &[u8]) -> Result<()> {
        write_record(stream, data).map_err(|e| self.map_io_error(e, "writing request"))
    }

    pub fn receive_message(
        &self,
        stream: &mut TcpStream,
        max_len: usize,
    ) -> Result<Option<Vec<u8>>> {
        read_record(stream, max_len).map_err(|e| match e {
            KrpcError::Io(io) => self.map_io_error(io, "reading reply"),
            other => other,
        })
    }

    /// Map IO errors to appropriate KrpcError variants
    ///
    /// - Timeouts/would block -> `Timeout`
    /// - Connection errors -> `Connection`
    /// - Other IO errors -> `Io`
    fn map_io_error(&self, err: std::io::Error, context: &str) -> KrpcError {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                KrpcError::Timeout(self.timeout.map(|t| t.as_millis() as u64).unwrap_or(0))
            }
            std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::NotConnected => {
                KrpcError::Connection(format!("{}: Connection lost", context))
            }
            _ => KrpcError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::record::{read_record, write_record};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_tcp_transport_default_has_no_timeout() {
        assert!(TcpTransport::new().timeout().is_none());
        assert!(TcpTransport::default().timeout().is_none());
        assert_eq!(
            TcpTransport::with_timeout(Duration::from_millis(250)).timeout(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_round_trip_against_echo_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let record = read_record(&mut stream, 64).unwrap().unwrap();
            write_record(&mut stream, &record).unwrap();
        });

        let transport = TcpTransport::with_timeout(Duration::from_secs(5));
        let mut stream = transport.connect(addr).unwrap();
        let reply = transport.round_trip(&mut stream, b"ping", 64).unwrap();
        assert_eq!(reply, b"ping");

        peer.join().unwrap();
    }

    #[test]
    fn test_peer_close_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = read_record(&mut stream, 64);
        });

        let transport = TcpTransport::new();
        let mut stream = transport.connect(addr).unwrap();
        let result = transport.round_trip(&mut stream, b"hello", 64);
        assert!(matches!(result, Err(KrpcError::Connection(_))));

        peer.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let result = TcpTransport::new().connect(addr);
        assert!(matches!(result, Err(KrpcError::Connection(_))));
    }
}
