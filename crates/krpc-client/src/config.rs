use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use krpc_common::tasks::INITIAL_VERSION;

/// Where and how the client reaches the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Program version requested in every call.
    pub version: u32,
    /// Bound on connect, send and receive. `None` blocks indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            version: INITIAL_VERSION,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
