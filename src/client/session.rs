//! EchoLog client for talking to the board over TCP

use crate::config::ClientConfig;
use crate::{EchologError, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

/// Client for one session against an EchoLog server.
///
/// The wire protocol is raw bytes: everything sent is appended to the
/// shared board, and completing a line makes the server stream the whole
/// board back on the same connection.
pub struct EchoClient {
    stream: TcpStream,
}

impl EchoClient {
    /// Connect to a server at the given address
    pub async fn connect(addr: &str) -> Result<Self> {
        let config = ClientConfig {
            server_addr: addr.to_string(),
            ..Default::default()
        };

        Self::with_config(config).await
    }

    /// Connect using a custom configuration
    pub async fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let connect_future = TcpStream::connect(&config.server_addr);
        let stream = timeout(Duration::from_secs(config.timeout_seconds), connect_future)
            .await
            .map_err(|_| EchologError::Connection("Connection timeout".to_string()))?
            .map_err(|e| {
                EchologError::Connection(format!(
                    "Failed to connect to {}: {}",
                    config.server_addr, e
                ))
            })?;

        Ok(Self { stream })
    }

    /// Send raw bytes to the board.
    ///
    /// A readback is triggered once the sent bytes complete a line; use
    /// [`read_exact`](Self::read_exact) or [`finish`](Self::finish) to
    /// collect it.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| EchologError::Client(format!("Failed to send: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| EchologError::Client(format!("Failed to send: {}", e)))?;
        Ok(())
    }

    /// Read exactly `len` readback bytes.
    ///
    /// The board only grows, so a client that tracks what it has written
    /// (and read back) knows the exact length to expect after each
    /// completed line.
    pub async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.stream
            .read_exact(&mut buf)
            .await
            .map_err(|e| EchologError::Client(format!("Failed to read readback: {}", e)))?;
        Ok(buf)
    }

    /// Finish the session: close the write half and collect whatever the
    /// server sends until it closes the connection.
    ///
    /// Returns the remaining readback, which is empty when no line was
    /// completed.
    pub async fn finish(mut self) -> Result<Vec<u8>> {
        self.stream
            .shutdown()
            .await
            .map_err(|e| EchologError::Client(format!("Failed to close write half: {}", e)))?;

        let mut readback = Vec::new();
        self.stream
            .read_to_end(&mut readback)
            .await
            .map_err(|e| EchologError::Client(format!("Failed to read readback: {}", e)))?;
        Ok(readback)
    }
}
