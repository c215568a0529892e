//! Response meta flags.
//!
//! The first part of every reply is a single byte telling the gateway which
//! follow-up work the transport carries. Bits are only ever added; a
//! decoder keeps bits it does not know.

use bitflags::bitflags;

bitflags! {
    /// Flags describing the reply transport.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResponseMeta: u8 {
        /// The service registered calls to other services.
        const SERVICE_CALL = 0x01;
        /// Files travel with the transport (download or call files).
        const FILES = 0x02;
        /// Transactions were registered.
        const TRANSACTIONS = 0x04;
        /// A download body was registered.
        const DOWNLOAD = 0x08;
    }
}

impl ResponseMeta {
    /// Meta for replies carrying no follow-up work.
    pub const EMPTY: ResponseMeta = ResponseMeta::empty();

    /// The wire byte.
    #[inline]
    pub fn to_byte(self) -> u8 {
        self.bits()
    }

    /// Decode a wire byte, retaining unknown bits.
    #[inline]
    pub fn from_byte(byte: u8) -> Self {
        Self::from_bits_retain(byte)
    }
}
