//! Dedicated writer task for outbound frames.
//!
//! Units never hold a lock on the pipe. Each reply is encoded into a single
//! frame buffer and queued on an mpsc channel; one task drains the queue,
//! batching whatever is ready into one flush.
//!
//! # Architecture
//!
//! ```text
//! Unit 1 ─┐
//! Unit 2 ─┼─► mpsc::Sender<Bytes> ─► Writer Task ─► Pipe
//! Unit N ─┘
//! ```

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, SdkError};

/// Frames queued before senders wait.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single flush.
const MAX_BATCH_SIZE: usize = 64;

/// Sender side of the writer task, shared by all units.
///
/// Cheaply cloneable.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
}

impl WriterHandle {
    /// Queue an encoded frame.
    ///
    /// Waits when the queue is full.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| SdkError::ConnectionClosed)
    }

    /// Whether the writer task has stopped.
    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start the task owning `writer`.
///
/// Must be called from within a tokio runtime. The task ends cleanly once
/// every handle is dropped, or with an error when the pipe fails.
pub fn spawn_writer_task<W>(writer: W, capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
    loop {
        let Some(first) = rx.recv().await else {
            // All handles dropped, clean shutdown
            return Ok(());
        };

        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        for frame in batch.drain(..) {
            if let Err(e) = writer.write_all(&frame).await {
                tracing::error!("Writer task failed: {}", e);
                return Err(SdkError::Io(e));
            }
        }
        writer.flush().await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};

    #[tokio::test]
    async fn test_writer_handle_send() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, 8);

        handle.send(Bytes::from_static(b"hello")).await.unwrap();

        let mut buf = [0u8; 5];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn test_writer_preserves_order() {
        let (client, mut server) = duplex(4096);
        let (handle, _task) = spawn_writer_task(client, 64);

        for i in 0..10u32 {
            handle.send(Bytes::copy_from_slice(&i.to_be_bytes())).await.unwrap();
        }

        let mut buf = [0u8; 40];
        server.read_exact(&mut buf).await.unwrap();
        for i in 0..10u32 {
            let start = i as usize * 4;
            let value = u32::from_be_bytes(buf[start..start + 4].try_into().unwrap());
            assert_eq!(value, i);
        }
    }

    #[tokio::test]
    async fn test_task_ends_when_handles_dropped() {
        let (client, _server) = duplex(64);
        let (handle, task) = spawn_writer_task(client, 8);

        drop(handle);
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_send_after_pipe_closed() {
        let (client, server) = duplex(64);
        let (handle, task) = spawn_writer_task(client, 8);
        drop(server);

        // The first write fails and stops the task.
        let _ = handle.send(Bytes::from_static(b"lost")).await;
        assert!(task.await.unwrap().is_err());
        assert!(handle.is_closed());
        assert!(matches!(
            handle.send(Bytes::from_static(b"x")).await,
            Err(SdkError::ConnectionClosed)
        ));
    }
}
