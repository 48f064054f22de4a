//! Configuration structures for EchoLog

use crate::{EchologError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server settings
    pub server: ServerSettings,
    /// Storage configuration
    pub storage: StorageSettings,
}

/// Core server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind the listening socket to
    pub bind_address: String,
    /// TCP port to listen on
    pub port: u16,
    /// Listen backlog for pending connections
    pub backlog: u32,
    /// Buffer size for reading client data
    pub buffer_size: usize,
    /// Seconds to wait for in-flight connections during shutdown
    pub shutdown_grace_secs: u64,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Path of the shared data file backing the board
    pub data_file: PathBuf,
}

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Server address to connect to
    pub server_addr: String,
    /// Connection timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "0.0.0.0".to_string(),
                port: 9000,
                backlog: 10,
                buffer_size: 1024,
                shutdown_grace_secs: 5,
            },
            storage: StorageSettings {
                data_file: PathBuf::from("/var/tmp/echolog.data"),
            },
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:9000".to_string(),
            timeout_seconds: 5,
        }
    }
}

impl ServerConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EchologError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| EchologError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.is_empty() {
            return Err(EchologError::Config(
                "Bind address cannot be empty".to_string(),
            ));
        }
        if self.server.buffer_size == 0 {
            return Err(EchologError::Config(
                "Buffer size must be at least one byte".to_string(),
            ));
        }
        if self.storage.data_file.as_os_str().is_empty() {
            return Err(EchologError::Config(
                "Data file path cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_addr.is_empty() {
            return Err(EchologError::Config(
                "Server address cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}
