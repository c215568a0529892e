//! The inter-process channel between the platform and a component.
//!
//! A [`Channel`] yields [`Request`]s and accepts [`Reply`]s. Socket and
//! queue transports are provided by the host; this crate ships
//! [`PipeChannel`] for any `AsyncRead`/`AsyncWrite` pair (stdio included).
//!
//! Request frames have three parts: `[action, mappings, command]`, where
//! `mappings` may be empty. Reply frames have two: `[meta, body]`.

mod pipe;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

pub use pipe::PipeChannel;

use crate::error::Result;
use crate::protocol::{DEFAULT_MAX_PAYLOAD_SIZE, ResponseMeta};
use crate::writer::DEFAULT_CHANNEL_CAPACITY;

/// Boxed future used at trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Identifier echoed in the reply frame.
    pub request_id: u32,
    /// Action named by the frame (may be overridden by the command).
    pub action: String,
    /// Msgpack-encoded schema mappings scoped to this request.
    pub mappings: Option<Bytes>,
    /// Msgpack-encoded command payload.
    pub command: Bytes,
}

/// An outbound reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub request_id: u32,
    pub meta: ResponseMeta,
    /// Msgpack-encoded body.
    pub body: Bytes,
    /// Set when the body is a runtime error (`{"error": ...}`) rather than
    /// a command reply.
    pub is_error: bool,
}

impl Reply {
    pub fn new(request_id: u32, meta: ResponseMeta, body: Bytes) -> Self {
        Self {
            request_id,
            meta,
            body,
            is_error: false,
        }
    }

    /// A runtime error reply; meta is always empty.
    pub fn error(request_id: u32, body: Bytes) -> Self {
        Self {
            request_id,
            meta: ResponseMeta::EMPTY,
            body,
            is_error: true,
        }
    }
}

/// Transport of requests and replies.
///
/// Implementations must be cancel-safe in `recv`: a unit that is told to
/// stop while waiting drops the future, and no request may be lost.
pub trait Channel: Send + Sync + 'static {
    /// Wait for the next request. `Ok(None)` means the channel is closed.
    fn recv(&self) -> BoxFuture<'_, Result<Option<Request>>>;

    /// Send a reply.
    fn send(&self, reply: Reply) -> BoxFuture<'_, Result<()>>;

    /// Write out every reply already sent and stop accepting new ones.
    ///
    /// Called once after the units have stopped. Channels that write
    /// synchronously in `send` have nothing to do.
    fn close(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }
}

/// Tuning for [`PipeChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Capacity of the inbound and outbound queues.
    pub channel_capacity: usize,
    /// Largest frame body accepted.
    pub max_payload_size: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}
