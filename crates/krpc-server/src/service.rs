//! Service lifecycle: listener, worker pool and shutdown.
//!
//! A started [`Service`] owns a multi-thread tokio runtime whose worker
//! threads form the pool serving requests. The listener accepts connections
//! and spawns one task per connection; each connection reads call records and
//! answers them in order until the peer disconnects or the service stops.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use krpc_server::{example_program, ProcfsTasks, ServerConfig, ServiceHandle};
//!
//! let program = Arc::new(example_program(ProcfsTasks::new()).unwrap());
//! let mut handle = ServiceHandle::new();
//! let port = handle.start(program, &ServerConfig::default()).unwrap();
//! println!("listening on {}", port);
//! handle.stop();
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use krpc_common::protocol::{KrpcError, Result};
use krpc_common::transport::{read_record_async, write_record_async};
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ServerConfig;
use crate::registry::Program;
use crate::svc::process_call;

/// How long `stop` waits for in-flight connections before abandoning them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A running service.
pub struct Service {
    runtime: Runtime,
    program: Arc<Program>,
    local_addr: SocketAddr,
    threads: usize,
    shutdown: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
}

impl Service {
    /// Binds the listener, starts the worker pool and begins accepting.
    ///
    /// Must not be called from inside an async context.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the runtime cannot
    /// be created, or the listener cannot bind.
    pub fn start(program: Arc<Program>, config: &ServerConfig) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.threads)
            .thread_name(format!("{}-svc", program.name()))
            .enable_all()
            .build()
            .map_err(|e| KrpcError::Transport(format!("Failed to start worker pool: {}", e)))?;

        let addr = config.socket_addr();
        let listener = runtime
            .block_on(TcpListener::bind(addr))
            .map_err(|e| KrpcError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| KrpcError::Transport(format!("Failed to get local address: {}", e)))?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = runtime.spawn(accept_loop(listener, program.clone(), shutdown_rx));

        tracing::info!(
            program = program.name(),
            threads = config.threads,
            "RPC server started at port: {}",
            local_addr.port()
        );

        Ok(Self {
            runtime,
            program,
            local_addr,
            threads: config.threads,
            shutdown,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn program(&self) -> &Arc<Program> {
        &self.program
    }

    /// Blocks until the process receives Ctrl-C.
    pub fn wait_for_ctrl_c(&self) -> Result<()> {
        self.runtime.block_on(tokio::signal::ctrl_c())?;
        Ok(())
    }

    /// Stops accepting, lets connections finish the request they are
    /// serving, then tears down the worker pool.
    pub fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.runtime.block_on(self.accept_task) {
            tracing::warn!("Accept loop ended abnormally: {}", e);
        }
        self.runtime.shutdown_timeout(SHUTDOWN_GRACE);
        tracing::info!(program = self.program.name(), "RPC server stopped");
    }
}

async fn accept_loop(
    listener: TcpListener,
    program: Arc<Program>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    tracing::debug!("Connection established from {}", peer_addr);
                    let program = program.clone();
                    let shutdown = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, program, shutdown).await {
                            tracing::warn!("Connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => tracing::error!("Failed to accept connection: {}", e),
            },
            _ = shutdown.changed() => break,
        }
    }
}

/// Serves one connection until the peer closes it or shutdown is signalled.
async fn handle_connection(
    mut stream: TcpStream,
    program: Arc<Program>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let max_request = program.max_request_size();

    loop {
        let record = tokio::select! {
            record = read_record_async(&mut stream, max_request) => record?,
            _ = shutdown.changed() => return Ok(()),
        };
        let Some(record) = record else {
            tracing::debug!("Connection closed by peer");
            return Ok(());
        };

        // Handlers do blocking work (procfs reads); keep it off the reactor.
        let reply = tokio::task::block_in_place(|| process_call(&program, &record));
        if let Some(reply) = reply {
            write_record_async(&mut stream, &reply).await?;
        }
    }
}

/// Holds at most one running [`Service`].
///
/// `start` on a running handle returns the existing port; `stop` on a handle
/// that was never started does nothing.
#[derive(Default)]
pub struct ServiceHandle {
    service: Option<Service>,
}

impl ServiceHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the service and returns the bound port.
    pub fn start(&mut self, program: Arc<Program>, config: &ServerConfig) -> Result<u16> {
        if let Some(service) = &self.service {
            tracing::debug!("Service already running");
            return Ok(service.port());
        }
        let service = Service::start(program, config)?;
        let port = service.port();
        self.service = Some(service);
        Ok(port)
    }

    pub fn is_running(&self) -> bool {
        self.service.is_some()
    }

    pub fn stop(&mut self) {
        match self.service.take() {
            Some(service) => service.stop(),
            None => tracing::debug!("Service not running"),
        }
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task_source::StaticTasks;
    use crate::tasks::example_program;
    use std::net::{IpAddr, Ipv4Addr};

    fn local() -> ServerConfig {
        ServerConfig::new().with_bind(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn program() -> Arc<Program> {
        Arc::new(example_program(StaticTasks::demo()).unwrap())
    }

    #[test]
    fn test_start_binds_ephemeral_port() {
        let service = Service::start(program(), &local().with_threads(2)).unwrap();
        assert_ne!(service.port(), 0);
        assert_eq!(service.threads(), 2);
        service.stop();
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = Service::start(program(), &local().with_threads(0));
        assert!(matches!(result, Err(KrpcError::Config(_))));
    }

    #[test]
    fn test_handle_lifecycle() {
        let mut handle = ServiceHandle::new();
        handle.stop();
        assert!(!handle.is_running());

        let port = handle.start(program(), &local()).unwrap();
        assert!(handle.is_running());
        assert_eq!(handle.start(program(), &local()).unwrap(), port);

        handle.stop();
        assert!(!handle.is_running());
        handle.stop();
    }

    #[test]
    fn test_bind_conflict() {
        let first = Service::start(program(), &local()).unwrap();
        let result = Service::start(program(), &local().with_port(first.port()));
        assert!(matches!(result, Err(KrpcError::Transport(_))));
        first.stop();
    }
}
