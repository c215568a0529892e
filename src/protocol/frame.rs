//! Frame struct and multipart body handling.
//!
//! A frame is a [`Header`] plus a body of `parts` segments, each prefixed
//! with its u32 BE length.
//!
//! # Example
//!
//! ```
//! use svc_runtime::protocol::{build_frame, Frame, Header};
//! use bytes::Bytes;
//!
//! let parts = [Bytes::from_static(b"read"), Bytes::new(), Bytes::from_static(b"cmd")];
//! let bytes = build_frame(0, 7, &parts).unwrap();
//! let header = Header::decode(&bytes).unwrap();
//! let frame = Frame::from_body(header, Bytes::copy_from_slice(&bytes[10..])).unwrap();
//! assert_eq!(frame.part(0), Some(&b"read"[..]));
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{Header, HEADER_SIZE, PART_PREFIX_SIZE};
use crate::error::{Result, SdkError};

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Body segments (zero-copy slices of the read buffer).
    pub parts: Vec<Bytes>,
}

impl Frame {
    /// Split a body into the parts its header declares.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Protocol`] when the prefixes do not add up to the
    /// body length.
    pub fn from_body(header: Header, mut body: Bytes) -> Result<Self> {
        let mut parts = Vec::with_capacity(header.parts as usize);
        for index in 0..header.parts {
            if body.len() < PART_PREFIX_SIZE {
                return Err(SdkError::Protocol(format!(
                    "Frame part {} is missing its length prefix",
                    index
                )));
            }
            let prefix = body.split_to(PART_PREFIX_SIZE);
            let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
            if body.len() < len {
                return Err(SdkError::Protocol(format!(
                    "Frame part {} declares {} bytes, {} available",
                    index,
                    len,
                    body.len()
                )));
            }
            parts.push(body.split_to(len));
        }
        if !body.is_empty() {
            return Err(SdkError::Protocol(format!(
                "{} trailing bytes after last frame part",
                body.len()
            )));
        }
        Ok(Self { header, parts })
    }

    /// Get a part by index.
    #[inline]
    pub fn part(&self, index: usize) -> Option<&[u8]> {
        self.parts.get(index).map(|b| b.as_ref())
    }

    #[inline]
    pub fn request_id(&self) -> u32 {
        self.header.request_id
    }

    #[inline]
    pub fn flags(&self) -> u8 {
        self.header.flags
    }

    #[inline]
    pub fn is_reply(&self) -> bool {
        self.header.is_reply()
    }
}

/// Length of a body holding `parts`.
pub fn body_length(parts: &[Bytes]) -> usize {
    parts.iter().map(|p| PART_PREFIX_SIZE + p.len()).sum()
}

/// Build a complete frame (header + length-prefixed parts) as one buffer.
///
/// # Errors
///
/// Returns [`SdkError::Protocol`] for more than 255 parts or a body over
/// `u32::MAX` bytes.
pub fn build_frame(flags: u8, request_id: u32, parts: &[Bytes]) -> Result<Bytes> {
    let count = u8::try_from(parts.len())
        .map_err(|_| SdkError::Protocol(format!("Too many frame parts: {}", parts.len())))?;
    let body_len = body_length(parts);
    let length = u32::try_from(body_len)
        .map_err(|_| SdkError::Protocol(format!("Frame body too large: {} bytes", body_len)))?;

    let header = Header::new(flags, count, request_id, length);
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body_len);
    buf.put_slice(&header.encode());
    for part in parts {
        buf.put_u32(part.len() as u32);
        buf.put_slice(part);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::flags;

    fn body(bytes: &Bytes) -> Bytes {
        bytes.slice(HEADER_SIZE..)
    }

    #[test]
    fn test_build_and_split() {
        let parts = vec![
            Bytes::from_static(b"read"),
            Bytes::new(),
            Bytes::from_static(b"command"),
        ];
        let bytes = build_frame(0, 9, &parts).unwrap();
        let header = Header::decode(&bytes).unwrap();

        assert_eq!(header.parts, 3);
        assert_eq!(header.request_id, 9);
        assert_eq!(header.payload_length as usize, body_length(&parts));

        let frame = Frame::from_body(header, body(&bytes)).unwrap();
        assert_eq!(frame.parts, parts);
        assert_eq!(frame.part(1), Some(&b""[..]));
        assert!(frame.part(3).is_none());
    }

    #[test]
    fn test_reply_flags_preserved() {
        let bytes = build_frame(flags::IS_REPLY, 1, &[Bytes::from_static(&[0x01])]).unwrap();
        let header = Header::decode(&bytes).unwrap();
        let frame = Frame::from_body(header, body(&bytes)).unwrap();
        assert!(frame.is_reply());
    }

    #[test]
    fn test_truncated_part_is_error() {
        let bytes = build_frame(0, 1, &[Bytes::from_static(b"abcdef")]).unwrap();
        let header = Header::decode(&bytes).unwrap();
        let truncated = bytes.slice(HEADER_SIZE..bytes.len() - 2);
        assert!(Frame::from_body(header, truncated).is_err());
    }

    #[test]
    fn test_trailing_bytes_is_error() {
        let bytes = build_frame(0, 1, &[Bytes::from_static(b"ab")]).unwrap();
        let header = Header::decode(&bytes).unwrap();
        let mut extended = BytesMut::from(&bytes[HEADER_SIZE..]);
        extended.put_u8(0);
        assert!(Frame::from_body(header, extended.freeze()).is_err());
    }

    #[test]
    fn test_too_many_parts() {
        let parts = vec![Bytes::new(); 256];
        assert!(build_frame(0, 1, &parts).is_err());
    }
}
