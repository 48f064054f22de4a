//! Per-connection protocol loop
//!
//! Each accepted client runs one handler task: bytes received are appended
//! to the shared [`LogStore`] chunk by chunk, and once a chunk carries a
//! newline the entire current store contents are streamed back to that
//! client. A connection supports any number of write/readback cycles until
//! the peer disconnects.

use crate::server::LogStore;
use crate::{EchologError, Result};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Drive one client connection to completion.
///
/// Generic over the stream so the protocol can be exercised against
/// in-memory streams in tests. Every received chunk is appended to the
/// store before the next read, preserving arrival order for this
/// connection. Bytes after a newline in the same chunk are appended too;
/// the readback reflects the store after the full chunk landed.
///
/// Returns `Ok(())` on a clean peer disconnect. A receive, append, or send
/// failure abandons the connection with a contextual error; none of these
/// are reported to the peer beyond the close itself.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    store: Arc<LogStore>,
    buffer_size: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = BytesMut::with_capacity(buffer_size);

    loop {
        buf.clear();
        let n = match stream.read_buf(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                return Err(EchologError::Connection(format!(
                    "Error receiving from {}: {}",
                    peer, e
                )));
            }
        };

        // Append before the next read so arrival order is preserved
        store.append(&buf[..n]).await?;

        if buf[..n].contains(&b'\n') {
            echo_store(&mut stream, &store, peer, buffer_size).await?;
        }
    }

    Ok(())
}

/// Stream the whole current store contents back to the client.
///
/// Snapshot-at-open: appends racing with this readback may or may not be
/// included. Short socket writes surface as errors via `write_all`.
async fn echo_store<S>(
    stream: &mut S,
    store: &LogStore,
    peer: SocketAddr,
    buffer_size: usize,
) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let Some(mut snapshot) = store.open_snapshot().await? else {
        // Nothing has ever been appended; nothing to echo
        return Ok(());
    };

    let mut chunk = vec![0u8; buffer_size];
    loop {
        let n = snapshot
            .read(&mut chunk)
            .await
            .map_err(EchologError::from)?;
        if n == 0 {
            break;
        }
        stream.write_all(&chunk[..n]).await.map_err(|e| {
            EchologError::Connection(format!("Error sending data to client {}: {}", peer, e))
        })?;
    }

    stream.flush().await.map_err(|e| {
        EchologError::Connection(format!("Error sending data to client {}: {}", peer, e))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_peer() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn test_store(dir: &tempfile::TempDir) -> Arc<LogStore> {
        Arc::new(LogStore::new(dir.path().join("board.data")))
    }

    #[tokio::test]
    async fn test_completed_line_is_echoed_back() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let (mut client, server) = tokio::io::duplex(256);

        let task = tokio::spawn(handle_connection(
            server,
            test_peer(),
            Arc::clone(&store),
            1024,
        ));

        client.write_all(b"hello\n").await.unwrap();
        let mut readback = vec![0u8; 6];
        client.read_exact(&mut readback).await.unwrap();
        assert_eq!(readback, b"hello\n");

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_incomplete_line_appends_without_echo() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let (mut client, server) = tokio::io::duplex(256);

        let task = tokio::spawn(handle_connection(
            server,
            test_peer(),
            Arc::clone(&store),
            1024,
        ));

        client.write_all(b"no terminator here").await.unwrap();
        drop(client);

        // Clean close, no readback was produced
        task.await.unwrap().unwrap();

        let content = tokio::fs::read(store.path()).await.unwrap();
        assert_eq!(content, b"no terminator here");
    }

    #[tokio::test]
    async fn test_bytes_after_terminator_are_not_truncated() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let (mut client, server) = tokio::io::duplex(256);

        let task = tokio::spawn(handle_connection(
            server,
            test_peer(),
            Arc::clone(&store),
            1024,
        ));

        client.write_all(b"abc\ndef").await.unwrap();
        let mut readback = vec![0u8; 7];
        client.read_exact(&mut readback).await.unwrap();
        assert_eq!(readback, b"abc\ndef");

        drop(client);
        task.await.unwrap().unwrap();

        let content = tokio::fs::read(store.path()).await.unwrap();
        assert_eq!(content, b"abc\ndef");
    }

    #[tokio::test]
    async fn test_multiple_write_phases_accumulate() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let (mut client, server) = tokio::io::duplex(256);

        let task = tokio::spawn(handle_connection(
            server,
            test_peer(),
            Arc::clone(&store),
            1024,
        ));

        client.write_all(b"a\n").await.unwrap();
        let mut first = vec![0u8; 2];
        client.read_exact(&mut first).await.unwrap();
        assert_eq!(first, b"a\n");

        client.write_all(b"b\n").await.unwrap();
        let mut second = vec![0u8; 4];
        client.read_exact(&mut second).await.unwrap();
        assert_eq!(second, b"a\nb\n");

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_append_failure_abandons_connection() {
        let store = Arc::new(LogStore::new("/nonexistent-echolog-dir/board.data"));
        let (mut client, server) = tokio::io::duplex(256);

        let task = tokio::spawn(handle_connection(server, test_peer(), store, 1024));

        client.write_all(b"doomed\n").await.unwrap();

        let result = task.await.unwrap();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_handler_against_mock_stream() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        // Scripted exchange: one line in, the full board back out
        let stream = tokio_test::io::Builder::new()
            .read(b"hello\n")
            .write(b"hello\n")
            .build();

        handle_connection(stream, test_peer(), store, 1024)
            .await
            .unwrap();
    }
}
