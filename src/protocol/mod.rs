//! Protocol module - wire format, framing, and reply meta.
//!
//! This module implements the binary protocol spoken over the channel:
//! - 10-byte header encoding/decoding
//! - Multipart frame bodies
//! - Frame buffer for accumulating partial reads
//! - The one-byte response meta bit-set

mod frame;
mod frame_buffer;
mod meta;
mod wire_format;

pub use frame::{body_length, build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use meta::ResponseMeta;
pub use wire_format::{
    flags, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, PART_PREFIX_SIZE,
};
