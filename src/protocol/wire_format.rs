//! Frame header layout.
//!
//! Implements the 10-byte header format:
//! ```text
//! ┌───────┬───────┬──────────┬──────────┐
//! │ Flags │ Parts │ Req ID   │ Length   │
//! │ 1 byte│ 1 byte│ 4 bytes  │ 4 bytes  │
//! │       │       │ uint32 BE│ uint32 BE│
//! └───────┴───────┴──────────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. `Length` counts the body, which
//! is `Parts` length-prefixed segments.

use crate::error::{Result, SdkError};

/// Header size in bytes (fixed, exactly 10).
pub const HEADER_SIZE: usize = 10;

/// Size of each part's length prefix.
pub const PART_PREFIX_SIZE: usize = 4;

/// Largest body accepted by default, 1 GiB.
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_073_741_824;

/// Bits of the header flags byte.
pub mod flags {
    /// Frame is a reply (1) or a request (0).
    pub const IS_REPLY: u8 = 0b0000_0001;
    /// Reply carries a runtime-level error body.
    pub const IS_ERROR: u8 = 0b0000_0010;

    /// Reserved bits mask (bits 2-7).
    pub const RESERVED_MASK: u8 = 0b1111_1100;

    /// Whether `flag` is set in `flags`.
    #[inline]
    pub fn has_flag(flags: u8, flag: u8) -> bool {
        flags & flag != 0
    }

    /// Error reply flags: is_reply + is_error = 0x03
    pub const ERROR_REPLY: u8 = IS_REPLY | IS_ERROR;
}

/// A frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// See [`flags`].
    pub flags: u8,
    /// Number of length-prefixed parts in the body.
    pub parts: u8,
    /// Request identifier, echoed in the reply.
    pub request_id: u32,
    /// Body length in bytes.
    pub payload_length: u32,
}

impl Header {
    pub fn new(flags: u8, parts: u8, request_id: u32, payload_length: u32) -> Self {
        Self {
            flags,
            parts,
            request_id,
            payload_length,
        }
    }

    /// Big-endian encoding.
    ///
    /// # Example
    ///
    /// ```
    /// use svc_runtime::protocol::{Header, flags};
    ///
    /// let header = Header::new(flags::IS_REPLY, 2, 42, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 10);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.flags;
        buf[1] = self.parts;
        buf[2..6].copy_from_slice(&self.request_id.to_be_bytes());
        buf[6..10].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Read a big-endian header from the front of `buf`.
    ///
    /// `None` while fewer than [`HEADER_SIZE`] bytes are available.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        Some(Self {
            flags: buf[0],
            parts: buf[1],
            request_id: u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]),
            payload_length: u32::from_be_bytes([buf[6], buf[7], buf[8], buf[9]]),
        })
    }

    /// Reject headers a peer must never send.
    ///
    /// Checks:
    /// - Payload length doesn't exceed max
    /// - Reserved flag bits are 0
    /// - A non-empty body declares at least one part
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(SdkError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        if self.flags & flags::RESERVED_MASK != 0 {
            return Err(SdkError::Protocol(
                "Reserved flag bits must be 0".to_string(),
            ));
        }

        if self.parts == 0 && self.payload_length != 0 {
            return Err(SdkError::Protocol(
                "Frame body present but no parts declared".to_string(),
            ));
        }

        Ok(())
    }

    #[inline]
    pub fn is_reply(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_REPLY)
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        flags::has_flag(self.flags, flags::IS_ERROR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size_is_10() {
        assert_eq!(HEADER_SIZE, 10);
        assert_eq!(Header::new(0, 0, 0, 0).encode().len(), 10);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let header = Header::new(flags::IS_REPLY, 2, 0xDEAD_BEEF, 1234);
        let decoded = Header::decode(&header.encode()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_big_endian_layout() {
        let bytes = Header::new(0x01, 3, 0x0102_0304, 0x0A0B_0C0D).encode();
        assert_eq!(bytes, [0x01, 3, 1, 2, 3, 4, 0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn test_decode_too_short() {
        assert!(Header::decode(&[0u8; 9]).is_none());
    }

    #[test]
    fn test_validate() {
        assert!(Header::new(0, 3, 1, 100).validate(1000).is_ok());
        assert!(Header::new(0, 3, 1, 2000).validate(1000).is_err());
        assert!(Header::new(0b1000_0000, 3, 1, 10).validate(1000).is_err());
        assert!(Header::new(0, 0, 1, 10).validate(1000).is_err());
        assert!(Header::new(0, 0, 1, 0).validate(1000).is_ok());
    }

    #[test]
    fn test_flag_accessors() {
        let header = Header::new(flags::ERROR_REPLY, 2, 1, 0);
        assert!(header.is_reply());
        assert!(header.is_error());
        assert!(!Header::new(0, 3, 1, 0).is_reply());
    }
}
