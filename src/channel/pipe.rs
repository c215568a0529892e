//! Channel over a byte pipe.
//!
//! A reader task splits the inbound stream into frames and queues decoded
//! requests; replies go through the shared writer task. Units take turns
//! on the inbound queue.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use super::{BoxFuture, Channel, ChannelConfig, Reply, Request};
use crate::error::{Result, SdkError};
use crate::protocol::{build_frame, flags, Frame, FrameBuffer};
use crate::writer::{spawn_writer_task, WriterHandle};

/// Number of parts in a request frame.
const REQUEST_PARTS: usize = 3;

/// A [`Channel`] over an `AsyncRead` / `AsyncWrite` pair.
pub struct PipeChannel {
    requests: Mutex<mpsc::Receiver<Result<Request>>>,
    /// `None` once closed.
    writer: Mutex<Option<WriterHandle>>,
    writer_task: Mutex<Option<JoinHandle<Result<()>>>>,
    reader_task: JoinHandle<()>,
}

impl PipeChannel {
    /// Start the reader and writer tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R, W>(reader: R, writer: W, config: ChannelConfig) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let (writer, writer_task) = spawn_writer_task(writer, config.channel_capacity);
        let reader_task = tokio::spawn(read_loop(reader, tx, config.max_payload_size));
        Self {
            requests: Mutex::new(rx),
            writer: Mutex::new(Some(writer)),
            writer_task: Mutex::new(Some(writer_task)),
            reader_task,
        }
    }

    /// Channel over the process's stdin and stdout.
    pub fn stdio(config: ChannelConfig) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), config)
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

impl Channel for PipeChannel {
    fn recv(&self) -> BoxFuture<'_, Result<Option<Request>>> {
        Box::pin(async move {
            let mut requests = self.requests.lock().await;
            requests.recv().await.transpose()
        })
    }

    fn send(&self, reply: Reply) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let frame_flags = if reply.is_error {
                flags::ERROR_REPLY
            } else {
                flags::IS_REPLY
            };
            let parts = [Bytes::copy_from_slice(&[reply.meta.to_byte()]), reply.body];
            let frame = build_frame(frame_flags, reply.request_id, &parts)?;
            let writer = self.writer.lock().await.clone();
            match writer {
                Some(writer) => writer.send(frame).await,
                None => Err(SdkError::ConnectionClosed),
            }
        })
    }

    /// Drop the sender and wait until the writer task has written and
    /// flushed every queued frame.
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.writer.lock().await.take();
            let Some(task) = self.writer_task.lock().await.take() else {
                return Ok(());
            };
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Writer task crashed: {}", e);
                    Err(SdkError::ConnectionClosed)
                }
            }
        })
    }
}

/// Decode a request frame.
fn request_from_frame(frame: Frame) -> Result<Request> {
    if frame.is_reply() {
        return Err(SdkError::Protocol(format!(
            "Unexpected reply frame for request {}",
            frame.request_id()
        )));
    }
    if frame.parts.len() != REQUEST_PARTS {
        return Err(SdkError::Protocol(format!(
            "Request frame has {} parts, expected {}",
            frame.parts.len(),
            REQUEST_PARTS
        )));
    }

    let request_id = frame.request_id();
    let mut parts = frame.parts.into_iter();
    let mut next = || parts.next().unwrap_or_default();
    let action = String::from_utf8(next().to_vec())
        .map_err(|_| SdkError::Protocol("Action name is not valid UTF-8".to_string()))?;
    let mappings = Some(next()).filter(|m| !m.is_empty());
    let command = next();

    Ok(Request {
        request_id,
        action,
        mappings,
        command,
    })
}

/// Read frames until EOF, queueing one entry per frame.
///
/// Per-frame problems are queued as errors; an unreadable stream ends
/// the loop, which closes the channel.
async fn read_loop<R>(mut reader: R, tx: mpsc::Sender<Result<Request>>, max_payload_size: u32)
where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("Channel closed by peer");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                tracing::error!("Channel read error: {}", e);
                let _ = tx.send(Err(SdkError::Io(e))).await;
                return;
            }
        };

        let frames = match frame_buffer.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!("Corrupt frame stream: {}", e);
                let _ = tx.send(Err(e)).await;
                return;
            }
        };

        for frame in frames {
            if tx.send(request_from_frame(frame)).await.is_err() {
                // Receiver gone, channel dropped
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Header, ResponseMeta, HEADER_SIZE};
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn request_frame(request_id: u32, action: &'static str, command: &'static [u8]) -> Bytes {
        let parts = [
            Bytes::from_static(action.as_bytes()),
            Bytes::new(),
            Bytes::from_static(command),
        ];
        build_frame(0, request_id, &parts).unwrap()
    }

    #[tokio::test]
    async fn test_recv_request() {
        let (mut peer, local) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(local);
        let channel = PipeChannel::new(read_half, write_half, ChannelConfig::default());

        peer.write_all(&request_frame(5, "read", b"\x80")).await.unwrap();

        let request = channel.recv().await.unwrap().unwrap();
        assert_eq!(request.request_id, 5);
        assert_eq!(request.action, "read");
        assert!(request.mappings.is_none());
        assert_eq!(&request.command[..], b"\x80");
    }

    #[tokio::test]
    async fn test_recv_none_on_eof() {
        let (peer, local) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(local);
        let channel = PipeChannel::new(read_half, write_half, ChannelConfig::default());

        drop(peer);
        assert!(channel.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_send_reply_frame() {
        let (mut peer, local) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(local);
        let channel = PipeChannel::new(read_half, write_half, ChannelConfig::default());

        let reply = Reply::new(9, ResponseMeta::TRANSACTIONS, Bytes::from_static(b"body"));
        channel.send(reply).await.unwrap();

        let mut header_bytes = [0u8; HEADER_SIZE];
        tokio::io::AsyncReadExt::read_exact(&mut peer, &mut header_bytes)
            .await
            .unwrap();
        let header = Header::decode(&header_bytes).unwrap();
        assert!(header.is_reply());
        assert!(!header.is_error());
        assert_eq!(header.request_id, 9);
        assert_eq!(header.parts, 2);

        let mut body = vec![0u8; header.payload_length as usize];
        tokio::io::AsyncReadExt::read_exact(&mut peer, &mut body)
            .await
            .unwrap();
        let frame = Frame::from_body(header, Bytes::from(body)).unwrap();
        assert_eq!(frame.part(0), Some(&[0x04][..]));
        assert_eq!(frame.part(1), Some(&b"body"[..]));
    }

    #[tokio::test]
    async fn test_close_flushes_queued_replies() {
        let (mut peer, local) = duplex(64);
        let (read_half, write_half) = tokio::io::split(local);
        let channel = PipeChannel::new(read_half, write_half, ChannelConfig::default());

        // Larger than the pipe buffer, so the writer is still busy.
        let body = Bytes::from(vec![7u8; 4096]);
        channel.send(Reply::new(3, ResponseMeta::EMPTY, body)).await.unwrap();

        let reader = tokio::spawn(async move {
            let mut received = Vec::new();
            let mut buf = [0u8; 256];
            while received.len() < HEADER_SIZE + 4 + 1 + 4 + 4096 {
                let n = peer.read(&mut buf).await.unwrap();
                assert!(n > 0);
                received.extend_from_slice(&buf[..n]);
            }
            received
        });

        channel.close().await.unwrap();
        let received = reader.await.unwrap();
        let frames = FrameBuffer::new().push(&received).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].part(1).map(<[u8]>::len), Some(4096));

        let late = Reply::new(4, ResponseMeta::EMPTY, Bytes::new());
        assert!(matches!(channel.send(late).await, Err(SdkError::ConnectionClosed)));
    }

    #[test]
    fn test_request_from_frame_part_count() {
        let bytes = build_frame(0, 1, &[Bytes::from_static(b"read")]).unwrap();
        let header = Header::decode(&bytes).unwrap();
        let frame = Frame::from_body(header, bytes.slice(HEADER_SIZE..)).unwrap();
        assert!(matches!(request_from_frame(frame), Err(SdkError::Protocol(_))));
    }

    #[test]
    fn test_request_from_frame_keeps_mappings() {
        let parts = [
            Bytes::from_static(b"read"),
            Bytes::from_static(b"\x80"),
            Bytes::from_static(b"\x80"),
        ];
        let bytes = build_frame(0, 1, &parts).unwrap();
        let header = Header::decode(&bytes).unwrap();
        let frame = Frame::from_body(header, bytes.slice(HEADER_SIZE..)).unwrap();

        let request = request_from_frame(frame).unwrap();
        assert_eq!(request.mappings.as_deref(), Some(&b"\x80"[..]));
    }

    #[test]
    fn test_reply_frame_rejected_as_request() {
        let parts = [Bytes::new(), Bytes::new(), Bytes::new()];
        let bytes = build_frame(flags::IS_REPLY, 1, &parts).unwrap();
        let header = Header::decode(&bytes).unwrap();
        let frame = Frame::from_body(header, bytes.slice(HEADER_SIZE..)).unwrap();
        assert!(request_from_frame(frame).is_err());
    }
}
