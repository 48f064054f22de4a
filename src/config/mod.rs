//! Configuration management for EchoLog

pub mod settings;

pub use settings::{ClientConfig, ServerConfig, ServerSettings, StorageSettings};
