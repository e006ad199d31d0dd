use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use krpc_common::protocol::{KrpcError, Result};

/// Listener and worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to.
    pub bind: IpAddr,
    /// Port the listener binds to. `0` asks the OS for an ephemeral port.
    pub port: u16,
    /// Worker threads serving requests. Must be at least one.
    pub threads: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 0,
            threads: 1,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Checks the settings before any resource is acquired.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(KrpcError::Config(
                "worker thread count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
