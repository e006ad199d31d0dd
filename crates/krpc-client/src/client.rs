use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use krpc_common::protocol::{KrpcError, Result};
use krpc_common::transport::TcpTransport;

use crate::config::ClientConfig;

/// Cached connection to one program version on one server.
///
/// The TCP stream is opened on the first round trip and reopened on the
/// next one after any transport failure. Round trips from several threads
/// are serialized on the stream.
pub struct Connection {
    addr: SocketAddr,
    program: u32,
    version: u32,
    transport: TcpTransport,
    stream: Mutex<Option<TcpStream>>,
    next_xid: AtomicU32,
}

impl Connection {
    fn new(program: u32, config: &ClientConfig) -> Self {
        let transport = match config.timeout {
            Some(timeout) => TcpTransport::with_timeout(timeout),
            None => TcpTransport::new(),
        };
        Self {
            addr: config.addr(),
            program,
            version: config.version,
            transport,
            stream: Mutex::new(None),
            next_xid: AtomicU32::new(1),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn program(&self) -> u32 {
        self.program
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn next_xid(&self) -> u32 {
        self.next_xid.fetch_add(1, Ordering::Relaxed)
    }

    /// Whether a TCP stream is currently open.
    pub fn is_connected(&self) -> bool {
        self.stream.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Sends one request record and returns the reply record.
    pub fn round_trip(&self, request: &[u8], max_reply: usize) -> Result<Vec<u8>> {
        let mut stream = self
            .stream
            .lock()
            .map_err(|_| KrpcError::Connection("connection lock poisoned".to_string()))?;

        if stream.is_none() {
            *stream = Some(self.transport.connect(self.addr)?);
            tracing::debug!("Connected to {}", self.addr);
        }
        let Some(conn) = stream.as_mut() else {
            return Err(KrpcError::Connection("no stream".to_string()));
        };

        let result = self.transport.round_trip(conn, request, max_reply);
        if let Err(e) = &result {
            tracing::debug!("Dropping connection to {}: {}", self.addr, e);
            *stream = None;
        }
        result
    }
}

/// Client side of the lifecycle: holds at most one [`Connection`].
///
/// ```no_run
/// use krpc_client::{ClientConfig, ClientContext};
/// use krpc_common::tasks::EXAMPLE_PROGRAM;
///
/// let mut ctx = ClientContext::new(EXAMPLE_PROGRAM, ClientConfig::new(2049));
/// ctx.init().unwrap();
/// let tasks = krpc_client::get_tasks(&ctx).unwrap();
/// ctx.shutdown();
/// ```
pub struct ClientContext {
    program: u32,
    config: ClientConfig,
    connection: Option<Connection>,
}

impl ClientContext {
    pub fn new(program: u32, config: ClientConfig) -> Self {
        Self {
            program,
            config,
            connection: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Creates the connection handle. Calling it again while initialised
    /// does nothing. No network traffic happens until the first call.
    pub fn init(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        if self.config.port == 0 {
            return Err(KrpcError::Config("server port must be set".to_string()));
        }
        self.connection = Some(Connection::new(self.program, &self.config));
        tracing::info!(
            program = self.program,
            version = self.config.version,
            "Client initialised for {}",
            self.config.addr()
        );
        Ok(())
    }

    pub fn get(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Drops the connection handle. Safe to call when never initialised.
    pub fn shutdown(&mut self) {
        if self.connection.take().is_some() {
            tracing::info!("Client shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut ctx = ClientContext::new(0x2000_0001, ClientConfig::new(4000));
        assert!(ctx.get().is_none());
        ctx.shutdown();

        ctx.init().unwrap();
        let addr = ctx.get().unwrap().addr();
        ctx.init().unwrap();
        assert_eq!(ctx.get().unwrap().addr(), addr);
        assert!(!ctx.get().unwrap().is_connected());

        ctx.shutdown();
        assert!(!ctx.is_initialized());
        ctx.shutdown();
    }

    #[test]
    fn test_init_requires_port() {
        let mut ctx = ClientContext::new(1, ClientConfig::default());
        assert!(matches!(ctx.init(), Err(KrpcError::Config(_))));
        assert!(ctx.get().is_none());
    }

    #[test]
    fn test_xids_increase() {
        let mut ctx = ClientContext::new(1, ClientConfig::new(1));
        ctx.init().unwrap();
        let conn = ctx.get().unwrap();
        let first = conn.next_xid();
        assert_eq!(conn.next_xid(), first + 1);
        assert_eq!(conn.program(), 1);
        assert_eq!(conn.version(), 1);
    }

    #[test]
    fn test_failed_connect_leaves_no_stream() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let mut ctx = ClientContext::new(1, ClientConfig::new(addr.port()));
        ctx.init().unwrap();
        let conn = ctx.get().unwrap();
        assert!(conn.round_trip(b"x", 16).is_err());
        assert!(!conn.is_connected());
    }
}
