//! Serde impls for [`Value`], including the extension envelopes.
//!
//! Decimals, dates and timestamps have no native msgpack type. They travel
//! as a two-field map:
//!
//! ```text
//! {"__type__": "decimal",  "value": "12.50"}
//! {"__type__": "date",     "value": "2017-01-27"}
//! {"__type__": "datetime", "value": "2017-01-27T20:12:08.952811"}
//! ```
//!
//! Decoding rehydrates any map of exactly that shape with a known tag and a
//! parsable value. Anything else stays a plain map.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::payload::{Decimal, Value};

/// Key holding the extension tag.
pub const TYPE_KEY: &str = "__type__";
/// Key holding the extension's string representation.
pub const VALUE_KEY: &str = "value";

pub const DECIMAL_TAG: &str = "decimal";
pub const DATE_TAG: &str = "date";
pub const DATETIME_TAG: &str = "datetime";

/// Wire format of dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Wire format of timestamps. Always six fractional digits, no zone suffix.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

fn serialize_envelope<S: Serializer>(
    serializer: S,
    tag: &str,
    repr: &str,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(2))?;
    map.serialize_entry(TYPE_KEY, tag)?;
    map.serialize_entry(VALUE_KEY, repr)?;
    map.end()
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::UInteger(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Binary(b) => serializer.serialize_bytes(b),
            Value::Decimal(d) => serialize_envelope(serializer, DECIMAL_TAG, d.as_str()),
            Value::Date(d) => {
                serialize_envelope(serializer, DATE_TAG, &d.format(DATE_FORMAT).to_string())
            }
            Value::Timestamp(ts) => serialize_envelope(
                serializer,
                DATETIME_TAG,
                &ts.format(DATETIME_FORMAT).to_string(),
            ),
            Value::Array(items) => serializer.collect_seq(items),
            Value::Map(map) => serializer.collect_map(map),
        }
    }
}

/// Parse a timestamp, tolerating the `+00:00` / `Z` suffix older peers send.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text
        .strip_suffix("+00:00")
        .or_else(|| text.strip_suffix('Z'))
        .unwrap_or(text);
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).ok()
}

/// Turn an envelope map into its extension value, if it is one.
fn rehydrate(map: BTreeMap<String, Value>) -> Value {
    if map.len() != 2 {
        return Value::Map(map);
    }
    let (Some(Value::String(tag)), Some(Value::String(repr))) =
        (map.get(TYPE_KEY), map.get(VALUE_KEY))
    else {
        return Value::Map(map);
    };

    let decoded = match tag.as_str() {
        DECIMAL_TAG => Decimal::parse(repr).map(Value::Decimal),
        DATE_TAG => parse_date(repr).map(Value::Date),
        DATETIME_TAG => parse_timestamp(repr).map(Value::Timestamp),
        _ => None,
    };
    decoded.unwrap_or(Value::Map(map))
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a msgpack value")
    }

    fn visit_unit<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
        Ok(Value::from(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Binary(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Binary(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<String>()? {
            let value = access.next_value()?;
            map.insert(key, value);
        }
        Ok(rehydrate(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
