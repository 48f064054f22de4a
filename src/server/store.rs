//! Shared append-only data file backing the board

use crate::{EchologError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only byte store shared by every connection.
///
/// All appends are serialized behind a mutex held across the whole
/// open-write-flush sequence, so two connections' appends can interleave
/// only at append-call granularity. Readers take no lock: a snapshot sees
/// the file as it was when opened.
pub struct LogStore {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl LogStore {
    /// Create a store handle for the given data file path
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    /// Path of the underlying data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append bytes at the current end of the data file, creating it if
    /// absent. A partial write surfaces as an error.
    pub async fn append(&self, bytes: &[u8]) -> Result<()> {
        let _guard = self.append_lock.lock().await;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                EchologError::Server(format!(
                    "Failed to open data file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }

    /// Open the data file for reading, positioned at the beginning.
    ///
    /// Returns `None` when the file does not exist yet; readers never
    /// create it. Appends racing with the returned handle are not
    /// guaranteed to be visible through it.
    pub async fn open_snapshot(&self) -> Result<Option<File>> {
        match File::open(&self.path).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EchologError::Server(format!(
                "Failed to open data file {} for reading: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Remove the data file. Idempotent: a missing file is not an error.
    pub async fn purge(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EchologError::Server(format!(
                "Failed to remove data file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Current length of the data file in bytes, 0 when absent
    pub async fn len(&self) -> Result<u64> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
