//! Codec module - wire encoding of payloads.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//! - [`ext`] - serde impls for [`Value`](crate::payload::Value), including the
//!   `{"__type__", "value"}` extension envelopes
//!
//! # Design
//!
//! Codecs are marker structs with static methods rather than trait objects.
//!
//! # Example
//!
//! ```
//! use svc_runtime::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&"hello").unwrap();
//! let decoded: String = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, "hello");
//! ```

pub mod ext;
mod msgpack;

pub use msgpack::MsgPackCodec;
