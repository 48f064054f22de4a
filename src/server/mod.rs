//! EchoLog server implementation

pub mod connection;
pub mod store;
pub mod tcp;

use crate::config::ServerConfig;
use crate::{EchologError, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

pub use store::LogStore;
pub use tcp::TcpServer;

/// Main EchoLog server that coordinates the data store, the TCP accept
/// loop, and the shutdown sequence.
pub struct EchoServer {
    config: ServerConfig,
    store: Arc<LogStore>,
    tcp: Option<TcpServer>,
    shutdown_tx: broadcast::Sender<()>,
    active: Arc<AtomicUsize>,
}

impl EchoServer {
    /// Create a server for the given configuration and bind its listening
    /// socket.
    ///
    /// The data file left behind by any previous run is removed here, so a
    /// restarted server always starts with an empty board. Bind failures
    /// surface as errors before any connection is accepted.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(LogStore::new(config.storage.data_file.clone()));
        store.purge().await?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let active = Arc::new(AtomicUsize::new(0));
        let tcp = TcpServer::bind(
            &config.server,
            Arc::clone(&store),
            shutdown_tx.clone(),
            Arc::clone(&active),
        )?;

        Ok(Self {
            config,
            store,
            tcp: Some(tcp),
            shutdown_tx,
            active,
        })
    }

    /// Address the listening socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        match &self.tcp {
            Some(tcp) => tcp.local_addr(),
            None => Err(EchologError::Server("Server is not bound".to_string())),
        }
    }

    /// Handle that triggers shutdown when a unit value is sent on it
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Shared data store backing the board
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    /// Serve connections until shutdown is signalled
    pub async fn serve(&self) -> Result<()> {
        match &self.tcp {
            Some(tcp) => tcp.run().await,
            None => Err(EchologError::Server("Server is not bound".to_string())),
        }
    }

    /// Run the shutdown sequence: stop accepting, wait for in-flight
    /// connections up to the configured grace period, release the
    /// listening socket, and remove the data file.
    ///
    /// Safe to call even when startup failed partway; every release step
    /// is a no-op for a resource that was never acquired.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown_tx.send(());
        self.drain().await;

        if let Some(tcp) = self.tcp.take() {
            // Dropping the server closes the listening socket
            drop(tcp);
            debug!("Listening socket released");
        }

        if let Err(e) = self.store.purge().await {
            warn!("Failed to remove data file during shutdown: {}", e);
        }

        info!("Shutdown complete");
    }

    async fn drain(&self) {
        let deadline =
            Instant::now() + Duration::from_secs(self.config.server.shutdown_grace_secs);

        while self.active.load(Ordering::SeqCst) > 0 {
            if Instant::now() >= deadline {
                warn!(
                    "Shutdown grace period expired with {} connection(s) still active",
                    self.active.load(Ordering::SeqCst)
                );
                break;
            }
            sleep(Duration::from_millis(50)).await;
        }
    }
}
