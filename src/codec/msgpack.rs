//! MsgPack codec using `rmp-serde`.
//!
//! **Always use `to_vec_named`, never `to_vec`.** Peers decode structs as
//! maps keyed by field name; `to_vec` would emit positional arrays.
//!
//! # Example
//!
//! ```
//! use svc_runtime::codec::MsgPackCodec;
//! use svc_runtime::payload::Value;
//!
//! let value = Value::from("hello");
//! let bytes = MsgPackCodec::pack(&value).unwrap();
//! assert_eq!(MsgPackCodec::unpack(&bytes).unwrap(), value);
//! ```

use crate::error::{Result, SdkError};
use crate::payload::Value;

/// MessagePack codec for structured data.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode any serde value to MsgPack bytes (struct-as-map).
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be serialized.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Decode MsgPack bytes to a value.
    ///
    /// # Errors
    ///
    /// Returns error if the bytes cannot be deserialized to type T.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    /// Encode a [`Value`] tree.
    pub fn pack(value: &Value) -> Result<Vec<u8>> {
        Self::encode(value)
    }

    /// Decode bytes into a [`Value`] tree, rehydrating extension records.
    ///
    /// # Errors
    ///
    /// [`SdkError::Serialization`] for data that has no `Value` shape
    /// (non-string map keys),
    /// [`SdkError::MsgPackDecode`] for malformed input.
    pub fn unpack(bytes: &[u8]) -> Result<Value> {
        rmp_serde::from_slice(bytes).map_err(|e| match e {
            rmp_serde::decode::Error::Syntax(msg) => SdkError::Serialization(msg),
            other => SdkError::MsgPackDecode(other),
        })
    }

    /// Convert any serde value into a [`Value`] tree.
    pub fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
        Self::unpack(&Self::encode(value)?)
    }

    /// Convert a [`Value`] tree into a typed value.
    pub fn from_value<T: serde::de::DeserializeOwned>(value: &Value) -> Result<T> {
        Self::decode(&Self::pack(value)?)
    }
}
