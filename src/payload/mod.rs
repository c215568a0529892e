//! Path-addressable payloads.
//!
//! A [`Payload`] wraps a [`Value`] tree and addresses nodes by delimited
//! paths such as `"command/arguments/action"`. Map segments are keys,
//! sequence segments are decimal indices.
//!
//! Rules shared by every operation:
//! - reads never fail and never mutate; a missing or mistyped segment is "absent"
//! - writes create missing intermediate maps
//! - writing *through* a scalar is an error
//! - an index that is negative, non-numeric or out of range makes the path
//!   "not exist": nothing is created and no error is raised
//!
//! # Example
//!
//! ```
//! use svc_runtime::payload::{Payload, Value};
//!
//! let mut payload = Payload::new();
//! payload.set("a/b", Value::from(1i64)).unwrap();
//! assert_eq!(payload.get("a/b"), Some(&Value::from(1i64)));
//! assert!(payload.exists("a"));
//! assert!(!payload.exists("a/c"));
//! ```

mod command;
mod mappings;
mod transport;
mod value;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use command::{CommandPayload, CommandReply, ErrorRecord, DEFAULT_ERROR_STATUS};
pub use mappings::{nomap, FieldMappings, NOMAP_PREFIX};
pub use transport::{TransactionKind, TransportPayload, NAME_DELIMITER};
pub use value::{Decimal, Value};

use crate::error::{Result, SdkError};

/// Default path delimiter.
pub const DEFAULT_DELIMITER: &str = "/";

/// An ordered, path-addressable document.
///
/// Equality compares the documents only, not their field mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    root: Value,
    #[serde(skip)]
    mappings: Option<Arc<FieldMappings>>,
}

impl Payload {
    /// Create an empty payload (root is an empty map).
    pub fn new() -> Self {
        Self::from_value(Value::map())
    }

    /// Wrap an existing value tree.
    pub fn from_value(root: Value) -> Self {
        Self {
            root,
            mappings: None,
        }
    }

    /// Resolve map segments through `mappings` from now on.
    ///
    /// See [`FieldMappings`] for the lookup rules.
    pub fn with_mappings(mut self, mappings: Arc<FieldMappings>) -> Self {
        self.mappings = Some(mappings);
        self
    }

    pub fn mappings(&self) -> Option<&Arc<FieldMappings>> {
        self.mappings.as_ref()
    }

    /// Borrow the root value.
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    /// Unwrap into the root value.
    pub fn into_value(self) -> Value {
        self.root
    }

    /// Get the node at `path`, or `None` if any segment is absent.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.get_with(path, DEFAULT_DELIMITER)
    }

    /// [`get`](Self::get) with a custom delimiter.
    pub fn get_with(&self, path: &str, delimiter: &str) -> Option<&Value> {
        let mappings = self.mappings.as_deref();
        let mut current = &self.root;
        for segment in path.split(delimiter) {
            current = match current {
                Value::Map(map) => map.get(map_key(mappings, map, segment))?,
                Value::Array(items) => items.get(parse_index(segment)?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Get a mutable reference to the node at `path`.
    pub fn get_mut(&mut self, path: &str) -> Option<&mut Value> {
        self.get_mut_with(path, DEFAULT_DELIMITER)
    }

    /// [`get_mut`](Self::get_mut) with a custom delimiter.
    pub fn get_mut_with(&mut self, path: &str, delimiter: &str) -> Option<&mut Value> {
        let mappings = self.mappings.as_deref();
        let mut current = &mut self.root;
        for segment in path.split(delimiter) {
            current = match current {
                Value::Map(map) => {
                    let key = map_key(mappings, map, segment);
                    map.get_mut(key)?
                }
                Value::Array(items) => items.get_mut(parse_index(segment)?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Get the node at `path`, or `default` when absent.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).cloned().unwrap_or(default)
    }

    /// [`get_or`](Self::get_or) with a custom delimiter.
    pub fn get_or_with(&self, path: &str, default: Value, delimiter: &str) -> Value {
        self.get_with(path, delimiter).cloned().unwrap_or(default)
    }

    /// Check whether `path` resolves to a node.
    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// [`exists`](Self::exists) with a custom delimiter.
    pub fn exists_with(&self, path: &str, delimiter: &str) -> bool {
        self.get_with(path, delimiter).is_some()
    }

    /// Set `value` at `path`, creating intermediate maps.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Path`] if an intermediate segment is a scalar.
    pub fn set(&mut self, path: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.set_with(path, value, DEFAULT_DELIMITER)
    }

    /// [`set`](Self::set) with a custom delimiter.
    pub fn set_with(
        &mut self,
        path: &str,
        value: impl Into<Value>,
        delimiter: &str,
    ) -> Result<&mut Self> {
        let mappings = self.mappings.as_deref();
        let segments: Vec<&str> = path.split(delimiter).collect();
        let (last, parents) = split_last(&segments);
        let Some(parent) = descend_creating(&mut self.root, mappings, parents, path)? else {
            return Ok(self);
        };

        match parent {
            Value::Map(map) => {
                let key = map_key(mappings, map, last).to_string();
                map.insert(key, value.into());
            }
            Value::Array(items) => {
                if let Some(slot) = parse_index(last).and_then(|i| items.get_mut(i)) {
                    *slot = value.into();
                }
            }
            _ => return Err(path_error(path, last)),
        }
        Ok(self)
    }

    /// Set several paths in order. Later entries win on conflicts.
    pub fn set_many<I, K, V>(&mut self, entries: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (path, value) in entries {
            self.set(path.as_ref(), value)?;
        }
        Ok(self)
    }

    /// Append `value` to the sequence at `path`.
    ///
    /// An absent node becomes `[value]`; a non-sequence node `old` becomes
    /// `[old, value]`.
    pub fn push(&mut self, path: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.push_with(path, value, DEFAULT_DELIMITER)
    }

    /// [`push`](Self::push) with a custom delimiter.
    pub fn push_with(
        &mut self,
        path: &str,
        value: impl Into<Value>,
        delimiter: &str,
    ) -> Result<&mut Self> {
        let mappings = self.mappings.as_deref();
        let segments: Vec<&str> = path.split(delimiter).collect();
        let (last, parents) = split_last(&segments);
        let Some(parent) = descend_creating(&mut self.root, mappings, parents, path)? else {
            return Ok(self);
        };

        match parent {
            Value::Map(map) => {
                let key = map_key(mappings, map, last).to_string();
                match map.entry(key) {
                    Entry::Vacant(entry) => {
                        entry.insert(Value::Array(vec![value.into()]));
                    }
                    Entry::Occupied(mut entry) => append(entry.get_mut(), value.into()),
                }
            }
            Value::Array(items) => {
                if let Some(slot) = parse_index(last).and_then(|i| items.get_mut(i)) {
                    append(slot, value.into());
                }
            }
            _ => return Err(path_error(path, last)),
        }
        Ok(self)
    }

    /// Remove the node at `path`.
    ///
    /// Maps left empty by the removal are removed as well. Returns whether
    /// anything was deleted.
    pub fn delete(&mut self, path: &str) -> bool {
        self.delete_with(path, DEFAULT_DELIMITER)
    }

    /// [`delete`](Self::delete) with a custom delimiter.
    pub fn delete_with(&mut self, path: &str, delimiter: &str) -> bool {
        let segments: Vec<&str> = path.split(delimiter).collect();
        remove_path(&mut self.root, self.mappings.as_deref(), &segments)
    }

    /// Wrap this payload under a single top-level key.
    ///
    /// The wrapped payload keeps the field mappings.
    pub fn entity(self, name: &str) -> Payload {
        let mut map = BTreeMap::new();
        map.insert(name.to_string(), self.root);
        Payload {
            root: Value::Map(map),
            mappings: self.mappings,
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Value> for Payload {
    fn from(root: Value) -> Self {
        Self::from_value(root)
    }
}

/// Key a map segment resolves to, honouring optional field mappings.
fn map_key<'a>(
    mappings: Option<&'a FieldMappings>,
    map: &BTreeMap<String, Value>,
    segment: &'a str,
) -> &'a str {
    match mappings {
        Some(mappings) => mappings.key(map, segment),
        None => segment,
    }
}

/// Parse a sequence index. Negative and non-numeric segments are rejected.
fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

fn split_last<'a, 'b>(segments: &'a [&'b str]) -> (&'b str, &'a [&'b str]) {
    match segments.split_last() {
        Some((last, parents)) => (*last, parents),
        None => ("", segments),
    }
}

fn path_error(path: &str, segment: &str) -> SdkError {
    SdkError::Path {
        path: path.to_string(),
        segment: segment.to_string(),
    }
}

/// Walk `segments`, creating missing maps.
///
/// Returns `Ok(None)` when a sequence index does not exist.
fn descend_creating<'a>(
    root: &'a mut Value,
    mappings: Option<&FieldMappings>,
    segments: &[&str],
    path: &str,
) -> Result<Option<&'a mut Value>> {
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Map(map) => {
                let key = map_key(mappings, map, segment).to_string();
                map.entry(key).or_insert_with(Value::map)
            }
            Value::Array(items) => match parse_index(segment).and_then(|i| items.get_mut(i)) {
                Some(item) => item,
                None => return Ok(None),
            },
            _ => return Err(path_error(path, segment)),
        };
    }
    Ok(Some(current))
}

fn append(slot: &mut Value, value: Value) {
    match slot {
        Value::Array(items) => items.push(value),
        other => {
            let old = std::mem::take(other);
            *other = Value::Array(vec![old, value]);
        }
    }
}

fn remove_path(node: &mut Value, mappings: Option<&FieldMappings>, segments: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };

    match node {
        Value::Map(map) => {
            let key = map_key(mappings, map, first).to_string();
            if rest.is_empty() {
                return map.remove(&key).is_some();
            }
            let Some(child) = map.get_mut(&key) else {
                return false;
            };
            let removed = remove_path(child, mappings, rest);
            if removed && child.is_empty_container() {
                map.remove(&key);
            }
            removed
        }
        Value::Array(items) => {
            let Some(index) = parse_index(first).filter(|i| *i < items.len()) else {
                return false;
            };
            if rest.is_empty() {
                items.remove(index);
                return true;
            }
            // Emptied elements stay in place so sibling indices do not shift.
            remove_path(&mut items[index], mappings, rest)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Payload {
        let mut payload = Payload::new();
        payload
            .set("a/b", 1i64)
            .unwrap()
            .set("list", Value::Array(vec![Value::from("x"), Value::map()]))
            .unwrap();
        payload
    }

    #[test]
    fn test_set_then_get() {
        let mut payload = Payload::new();
        payload.set("a/b", 1i64).unwrap();

        assert_eq!(payload.get("a/b"), Some(&Value::Integer(1)));
        assert!(payload.exists("a"));
        assert!(!payload.exists("a/c"));
        assert_eq!(payload.get_or("a/c", Value::from("d")), Value::from("d"));
    }

    #[test]
    fn test_set_overwrites_leaf() {
        let mut payload = sample();
        payload.set("a/b", "new").unwrap();
        assert_eq!(payload.get("a/b"), Some(&Value::from("new")));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut payload = sample();
        let err = payload.set("a/b/c", 2i64).unwrap_err();
        assert!(matches!(err, SdkError::Path { ref segment, .. } if segment == "b"));
        // Original value untouched
        assert_eq!(payload.get("a/b"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_index_segments() {
        let mut payload = sample();
        assert_eq!(payload.get("list/0"), Some(&Value::from("x")));
        assert!(payload.get("list/2").is_none());
        assert!(payload.get("list/-1").is_none());
        assert!(payload.get("list/x").is_none());

        payload.set("list/1/k", true).unwrap();
        assert_eq!(payload.get("list/1/k"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_bad_index_is_silent_noop() {
        let mut payload = sample();
        let before = payload.clone();

        payload.set("list/5/k", 1i64).unwrap();
        payload.set("list/-1", 1i64).unwrap();
        payload.push("list/9", 1i64).unwrap();

        assert_eq!(payload, before);
    }

    #[test]
    fn test_get_through_scalar_is_absent() {
        let payload = sample();
        assert!(payload.get("a/b/c").is_none());
        assert!(!payload.exists("a/b/c"));
    }

    #[test]
    fn test_push_semantics() {
        let mut payload = Payload::new();

        payload.push("p", 1i64).unwrap();
        assert_eq!(payload.get("p"), Some(&Value::Array(vec![Value::Integer(1)])));

        payload.push("p", 2i64).unwrap();
        assert_eq!(
            payload.get("p"),
            Some(&Value::Array(vec![Value::Integer(1), Value::Integer(2)]))
        );

        payload.set("s", "x").unwrap();
        payload.push("s", "y").unwrap();
        assert_eq!(
            payload.get("s"),
            Some(&Value::Array(vec![Value::from("x"), Value::from("y")]))
        );
    }

    #[test]
    fn test_push_creates_ancestors() {
        let mut payload = Payload::new();
        payload.push("x/y/z", 1i64).unwrap();
        assert!(payload.get("x/y").unwrap().is_map());
    }

    #[test]
    fn test_custom_delimiter() {
        let mut payload = Payload::new();
        payload.set_with("errors|http://a/b|users|1.0", "e", "|").unwrap();

        assert!(payload.exists_with("errors|http://a/b|users", "|"));
        assert!(payload.get("errors/http:").is_none());
        assert_eq!(
            payload.get_with("errors|http://a/b|users|1.0", "|"),
            Some(&Value::from("e"))
        );
    }

    #[test]
    fn test_set_many_last_wins() {
        let mut payload = Payload::new();
        payload
            .set_many([("a", Value::from(1i64)), ("b", Value::from(2i64)), ("a", Value::from(3i64))])
            .unwrap();
        assert_eq!(payload.get("a"), Some(&Value::Integer(3)));
        assert_eq!(payload.get("b"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_delete_removes_empty_parents() {
        let mut payload = Payload::new();
        payload.set("a/b/c", 1i64).unwrap();
        payload.set("x", 1i64).unwrap();

        assert!(payload.delete("a/b/c"));
        assert!(!payload.exists("a"));
        assert!(payload.exists("x"));
        assert!(!payload.delete("a/b/c"));
    }

    #[test]
    fn test_delete_keeps_non_empty_parents() {
        let mut payload = Payload::new();
        payload.set("a/b", 1i64).unwrap();
        payload.set("a/c", 2i64).unwrap();

        assert!(payload.delete("a/b"));
        assert_eq!(payload.get("a/c"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_entity_wraps_root() {
        let payload = sample().entity("user");
        assert_eq!(payload.get("user/a/b"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_mapped_reads_fall_back_to_alias() {
        let root: Value = [("m", [("i", Value::from("req-1"))].into_iter().collect::<Value>())]
            .into_iter()
            .collect();
        let payload = Payload::from_value(root).with_mappings(FieldMappings::standard());

        assert_eq!(payload.get("meta/id"), Some(&Value::from("req-1")));
        assert_eq!(payload.get("m/i"), Some(&Value::from("req-1")));
        assert!(payload.get("!meta/id").is_none());
        assert!(Payload::from_value(payload.as_value().clone()).get("meta/id").is_none());
    }

    #[test]
    fn test_mapped_writes_use_alias() {
        let mut payload = Payload::new().with_mappings(FieldMappings::standard());
        payload.set("meta/id", "req-1").unwrap();
        payload.push("errors/users", "boom").unwrap();
        payload.set("meta/!type", "x").unwrap();

        let raw = Payload::from_value(payload.as_value().clone());
        assert_eq!(raw.get("m/i"), Some(&Value::from("req-1")));
        assert_eq!(raw.get("e/users/0"), Some(&Value::from("boom")));
        assert_eq!(raw.get("m/type"), Some(&Value::from("x")));
        assert!(raw.get("meta").is_none());
    }

    #[test]
    fn test_mapped_writes_keep_existing_full_names() {
        let root: Value = [("meta", Value::map())].into_iter().collect();
        let mut payload = Payload::from_value(root).with_mappings(FieldMappings::standard());
        payload.set("meta/id", "req-1").unwrap();

        let meta = payload.as_value().field("meta").unwrap();
        assert_eq!(meta.field("i"), Some(&Value::from("req-1")));
        assert!(payload.as_value().field("m").is_none());
    }

    #[test]
    fn test_mapped_delete() {
        let mut payload = Payload::new().with_mappings(FieldMappings::standard());
        payload.set("meta/id", "req-1").unwrap();

        assert!(payload.delete("meta/id"));
        assert!(payload.as_value().field("m").is_none());
    }

    #[test]
    fn test_equality_ignores_mappings() {
        let plain = sample();
        let mapped = sample().with_mappings(FieldMappings::standard());
        assert_eq!(plain, mapped);
    }

    #[test]
    fn test_structural_equality() {
        let mut a = Payload::new();
        a.set("x", 1i64).unwrap().set("y", 2i64).unwrap();
        let mut b = Payload::new();
        b.set("y", 2i64).unwrap().set("x", 1i64).unwrap();
        assert_eq!(a, b);
    }
}
