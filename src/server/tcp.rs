//! TCP listener and accept loop

use crate::config::ServerSettings;
use crate::server::{connection, LogStore};
use crate::{EchologError, Result};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// TCP server owning the listening socket and the accept loop.
///
/// The socket is bound with the reuse-address option so a restart right
/// after a previous instance exits does not fail on "address in use".
pub struct TcpServer {
    listener: TcpListener,
    store: Arc<LogStore>,
    shutdown: broadcast::Sender<()>,
    buffer_size: usize,
    active: Arc<AtomicUsize>,
}

impl TcpServer {
    /// Create the listening socket and bind it.
    ///
    /// Socket creation, option setting, bind, and listen failures are all
    /// startup faults; the caller treats them as fatal.
    pub fn bind(
        settings: &ServerSettings,
        store: Arc<LogStore>,
        shutdown: broadcast::Sender<()>,
        active: Arc<AtomicUsize>,
    ) -> Result<Self> {
        let ip: IpAddr = settings.bind_address.parse().map_err(|e| {
            EchologError::Config(format!(
                "Invalid bind address {}: {}",
                settings.bind_address, e
            ))
        })?;
        let addr = SocketAddr::new(ip, settings.port);

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|e| EchologError::Server(format!("Error creating socket: {}", e)))?;

        socket
            .set_reuseaddr(true)
            .map_err(|e| EchologError::Server(format!("Error setting socket options: {}", e)))?;
        socket
            .bind(addr)
            .map_err(|e| EchologError::Server(format!("Error binding socket {}: {}", addr, e)))?;

        let listener = socket
            .listen(settings.backlog)
            .map_err(|e| EchologError::Server(format!("Error listening on socket: {}", e)))?;

        Ok(Self {
            listener,
            store,
            shutdown,
            buffer_size: settings.buffer_size,
            active,
        })
    }

    /// Address the listening socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(EchologError::from)
    }

    /// Run the accept loop until shutdown is signalled.
    ///
    /// Accept failures never terminate the loop: a signal-interrupted
    /// accept retries silently, anything else is logged and the loop
    /// continues.
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => self.dispatch(stream, peer),
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => warn!("Error accepting connection: {}", e),
                    }
                }
                _ = shutdown_rx.recv() => break,
            }
        }

        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        let store = Arc::clone(&self.store);
        let active = Arc::clone(&self.active);
        let buffer_size = self.buffer_size;

        active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            info!("Accepted connection from {}", peer);
            if let Err(e) = connection::handle_connection(stream, peer, store, buffer_size).await {
                warn!("{}", e);
            }
            info!("Closed connection from {}", peer);
            active.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use tempfile::tempdir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::{sleep, timeout, Duration};

    fn test_settings() -> ServerSettings {
        let mut config = ServerConfig::default();
        config.server.bind_address = "127.0.0.1".to_string();
        config.server.port = 0;
        config.server
    }

    fn test_server(dir: &tempfile::TempDir) -> (Arc<TcpServer>, broadcast::Sender<()>) {
        let store = Arc::new(LogStore::new(dir.path().join("board.data")));
        let (shutdown_tx, _) = broadcast::channel(1);
        let server = TcpServer::bind(
            &test_settings(),
            store,
            shutdown_tx.clone(),
            Arc::new(AtomicUsize::new(0)),
        )
        .unwrap();
        (Arc::new(server), shutdown_tx)
    }

    #[tokio::test]
    async fn test_bind_assigns_local_addr() {
        let dir = tempdir().unwrap();
        let (server, _shutdown) = test_server(&dir);

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_invalid_bind_address_is_rejected() {
        let mut settings = test_settings();
        settings.bind_address = "not-an-address".to_string();

        let store = Arc::new(LogStore::new("/tmp/unused.data"));
        let (shutdown_tx, _) = broadcast::channel(1);
        let result = TcpServer::bind(&settings, store, shutdown_tx, Arc::new(AtomicUsize::new(0)));
        assert!(matches!(result, Err(crate::EchologError::Config(_))));
    }

    #[tokio::test]
    async fn test_accepts_and_serves_a_connection() {
        let dir = tempdir().unwrap();
        let (server, shutdown_tx) = test_server(&dir);
        let addr = server.local_addr().unwrap();

        let runner = Arc::clone(&server);
        let server_handle = tokio::spawn(async move { runner.run().await });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"ping\n").await.unwrap();
        let mut readback = vec![0u8; 5];
        stream.read_exact(&mut readback).await.unwrap();
        assert_eq!(readback, b"ping\n");
        drop(stream);

        let _ = shutdown_tx.send(());
        let result = timeout(Duration::from_secs(2), server_handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_accept_loop() {
        let dir = tempdir().unwrap();
        let (server, shutdown_tx) = test_server(&dir);

        let runner = Arc::clone(&server);
        let server_handle = tokio::spawn(async move { runner.run().await });

        // Give the accept loop time to start
        sleep(Duration::from_millis(100)).await;

        let _ = shutdown_tx.send(());

        let result = timeout(Duration::from_secs(2), server_handle).await;
        assert!(result.is_ok());
        assert!(result.unwrap().unwrap().is_ok());
    }
}
