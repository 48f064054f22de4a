//! # EchoLog - Durable Append-and-Echo TCP Service
//!
//! EchoLog is a small persistent TCP service acting as a rudimentary durable
//! message board. Every byte a client sends is appended to a single shared
//! data file; once a client completes a line, the entire accumulated file is
//! streamed back to that client.
//!
//! ## Features
//!
//! - **Shared Durable Board**: one append-only data file shared by all clients
//! - **Line-Triggered Readback**: a newline ends a write phase and echoes the
//!   whole board back to the writer
//! - **Graceful Lifecycle**: SIGINT/SIGTERM stop the accept loop, drain
//!   in-flight connections, and remove the data file
//! - **Detached Mode**: optional double-fork daemonization on Unix
//! - **Async I/O**: Tokio throughout; slow clients never block new accepts
//!
//! ## Quick Start
//!
//! ### Server
//! ```no_run
//! use echolog::config::ServerConfig;
//! use echolog::server::EchoServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::from_file("config/echolog.toml")?;
//!     let mut server = EchoServer::bind(config).await?;
//!     server.serve().await?;
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ### Client
//! ```no_run
//! use echolog::client::EchoClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = EchoClient::connect("127.0.0.1:9000").await?;
//!     client.send(b"hello board\n").await?;
//!
//!     let board = client.finish().await?;
//!     println!("{}", String::from_utf8_lossy(&board));
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
#[cfg(unix)]
pub mod daemon;
pub mod server;

/// Common error types used throughout EchoLog
pub mod error {
    use std::fmt;

    /// EchoLog error types
    #[derive(Debug)]
    pub enum EchologError {
        /// I/O operation failed
        Io(std::io::Error),
        /// Configuration error
        Config(String),
        /// Server error
        Server(String),
        /// Client error
        Client(String),
        /// Connection error
        Connection(String),
    }

    impl fmt::Display for EchologError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                EchologError::Io(e) => write!(f, "I/O error: {}", e),
                EchologError::Config(e) => write!(f, "Configuration error: {}", e),
                EchologError::Server(e) => write!(f, "Server error: {}", e),
                EchologError::Client(e) => write!(f, "Client error: {}", e),
                EchologError::Connection(e) => write!(f, "Connection error: {}", e),
            }
        }
    }

    impl std::error::Error for EchologError {}

    impl From<std::io::Error> for EchologError {
        fn from(err: std::io::Error) -> Self {
            EchologError::Io(err)
        }
    }

    /// Result type alias for EchoLog operations
    pub type Result<T> = std::result::Result<T, EchologError>;
}

pub use error::{EchologError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::EchoClient;
    pub use crate::config::{ClientConfig, ServerConfig};
    pub use crate::server::{EchoServer, LogStore};
    pub use crate::{EchologError, Result};
}
