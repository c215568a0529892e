//! Reassembly of frames from a byte stream.
//!
//! Reads from a pipe arrive in arbitrary chunks. The buffer keeps the
//! unconsumed bytes in a `BytesMut` and moves between two states:
//! - `WaitingForHeader`: Need at least 10 bytes
//! - `WaitingForBody`: Header parsed, need N more body bytes
//!
//! # Example
//!
//! ```ignore
//! use svc_runtime::protocol::FrameBuffer;
//!
//! let mut buffer = FrameBuffer::new();
//!
//! // Data arrives in chunks from the pipe
//! for frame in buffer.push(&chunk)? {
//!     println!("request {} with {} parts", frame.request_id(), frame.parts.len());
//! }
//! ```

use bytes::BytesMut;

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// Where the parser is within the current frame.
#[derive(Debug, Clone)]
enum State {
    /// Fewer than [`HEADER_SIZE`] bytes of the next frame are buffered.
    WaitingForHeader,
    /// Header accepted; the body is incomplete.
    WaitingForBody { header: Header },
}

/// Splits an inbound byte stream into [`Frame`]s.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    /// Bodies larger than this are rejected at the header.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Buffer accepting bodies up to [`DEFAULT_MAX_PAYLOAD_SIZE`].
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Append a chunk and return every frame it completes.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns error on an invalid header or a body whose parts do not
    /// match its length. The buffer is unusable afterwards.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match &self.state {
            State::WaitingForHeader => {
                let Some(header) = Header::decode(&self.buffer) else {
                    return Ok(None);
                };
                header.validate(self.max_payload_size)?;

                let _ = self.buffer.split_to(HEADER_SIZE);
                self.state = State::WaitingForBody { header };
                self.try_extract_one()
            }

            State::WaitingForBody { header } => {
                let remaining = header.payload_length as usize;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }

                let header = *header;
                let body = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForHeader;

                Frame::from_body(header, body).map(Some)
            }
        }
    }

    /// Bytes buffered but not yet part of a returned frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop buffered bytes and start over at a frame boundary.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForBody { .. } => "WaitingForBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
