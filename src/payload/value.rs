//! The `Value` tree carried by every payload.
//!
//! A tagged union over the leaves the wire format can carry, plus the three
//! extension leaves (decimal, date, timestamp) that travel as
//! `{"__type__": tag, "value": repr}` records. Values are classified once,
//! when they are decoded; everything downstream matches on the tag.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, SubsecRound};
use regex::Regex;

/// Exact base-10 number, kept in its textual form.
///
/// No arithmetic is offered; the runtime only has to carry decimals from
/// one service to the next without losing precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal(String);

fn decimal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("Decimal pattern is valid")
    })
}

impl Decimal {
    /// Parse a decimal literal (`"12.50"`, `"-3"`, `"1e-4"`).
    ///
    /// Returns `None` if the text is not a base-10 number.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if decimal_regex().is_match(text) {
            Some(Self(text.to_string()))
        } else {
            None
        }
    }

    /// The exact textual representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lossy conversion, for range checks.
    pub fn to_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A tree-shaped value.
///
/// Maps use `BTreeMap`, so key order is deterministic and equality is
/// structural.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Explicit null. Distinct from an absent path.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Unsigned integer above `i64::MAX`. Smaller unsigned values are
    /// always [`Value::Integer`].
    UInteger(u64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Binary blob, carried as msgpack `bin`.
    Binary(Vec<u8>),
    /// Exact decimal.
    Decimal(Decimal),
    /// Calendar date.
    Date(NaiveDate),
    /// Date and time, implicitly UTC. The wire carries microseconds; build
    /// it with `Value::from` to drop finer digits up front.
    Timestamp(NaiveDateTime),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// String-keyed mapping.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// An empty map.
    pub fn map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// An empty array.
    pub fn array() -> Self {
        Value::Array(Vec::new())
    }

    /// Short name of the tag, used in error messages and param typing.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) | Value::UInteger(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Binary(_) => "binary",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "datetime",
            Value::Array(_) => "array",
            Value::Map(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Value::Map(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// True for a map or an array with no children.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Value::Map(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Truthiness used when deriving response flags.
    ///
    /// Null, `false`, zero, and empty strings, blobs and containers are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::UInteger(_) => true,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Binary(b) => !b.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Decimal(_) | Value::Date(_) | Value::Timestamp(_) => true,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Integer(i) => u64::try_from(*i).ok(),
            Value::UInteger(u) => Some(*u),
            _ => None,
        }
    }

    /// Numeric view of integers, floats and decimals.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::UInteger(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Lookup of a direct child key on a map.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Convert to JSON for display and logging.
    ///
    /// Binary is rendered as an array of bytes; extension leaves as strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::UInteger(u) => Json::from(*u),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Binary(b) => Json::Array(b.iter().map(|byte| Json::from(*byte)).collect()),
            Value::Decimal(d) => Json::String(d.to_string()),
            Value::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Value::Timestamp(ts) => Json::String(ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Value::UInteger(v), Value::Integer)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v.trunc_subsecs(6))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match v {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => Value::Integer(i),
                (None, Some(u)) => Value::UInteger(u),
                _ => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse() {
        assert_eq!(Decimal::parse("12.50").unwrap().as_str(), "12.50");
        assert_eq!(Decimal::parse(" -3 ").unwrap().as_str(), "-3");
        assert!(Decimal::parse("1e-4").is_some());
        assert!(Decimal::parse(".5").is_some());
        assert!(Decimal::parse("abc").is_none());
        assert!(Decimal::parse("1.2.3").is_none());
        assert!(Decimal::parse("").is_none());
    }

    #[test]
    fn test_timestamp_truncated_to_micros() {
        let ts = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_nano_opt(3, 4, 5, 123_456_789)
            .unwrap();
        let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 123_456)
            .unwrap();
        assert_eq!(Value::from(ts), Value::Timestamp(expected));
    }

    #[test]
    fn test_unsigned_conversion() {
        assert_eq!(Value::from(5u64), Value::Integer(5));
        assert_eq!(Value::from(u64::MAX), Value::UInteger(u64::MAX));
        assert_eq!(Value::from(u64::MAX).as_i64(), None);
        assert_eq!(Value::from(u64::MAX).as_u64(), Some(u64::MAX));
        assert_eq!(Value::from(u64::MAX).type_name(), "integer");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(!Value::map().is_truthy());
        assert!(!Value::array().is_truthy());
        assert!(!Value::from(0i64).is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::Array(vec![Value::Null]).is_truthy());
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"a": [1, 2.5, "x", null, true]});
        let value = Value::from(json);
        let items = value.field("a").and_then(Value::as_array).unwrap();
        assert_eq!(items[0], Value::Integer(1));
        assert_eq!(items[1], Value::Float(2.5));
        assert_eq!(items[2], Value::from("x"));
        assert_eq!(items[3], Value::Null);
        assert_eq!(items[4], Value::Bool(true));
    }

    #[test]
    fn test_to_json_extension_leaves() {
        let date = NaiveDate::from_ymd_opt(2017, 1, 27).unwrap();
        let ts = date.and_hms_micro_opt(20, 12, 8, 952811).unwrap();
        assert_eq!(Value::from(date).to_json(), serde_json::json!("2017-01-27"));
        assert_eq!(
            Value::from(ts).to_json(),
            serde_json::json!("2017-01-27T20:12:08.952811")
        );
    }

    #[test]
    fn test_from_iterator_builds_map() {
        let value: Value = [("b", 2i64), ("a", 1i64)].into_iter().collect();
        let keys: Vec<_> = value.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::from("x"));
    }
}
