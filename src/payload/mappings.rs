//! Short aliases for payload field names.
//!
//! The platform can shorten well-known field names on the wire, e.g.
//! `meta` travels as `m` and `transport` as `t`. A [`Payload`](super::Payload)
//! carrying a [`FieldMappings`] table resolves a path segment like this:
//!
//! - the segment is used as given when that key exists, else its alias;
//!   writes therefore never shadow an existing key
//! - a segment starting with `!` is used verbatim (without the `!`)
//!
//! Names that are not in the table always resolve to themselves.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use super::Value;

/// Prefix that disables mapping for one path segment.
pub const NOMAP_PREFIX: char = '!';

/// Aliases the platform uses for payload field names.
const STANDARD: &[(&str, &str)] = &[
    ("action", "a"),
    ("address", "a"),
    ("arguments", "a"),
    ("attributes", "a"),
    ("available", "a"),
    ("actions", "ac"),
    ("array_format", "af"),
    ("body", "b"),
    ("buffers", "b"),
    ("busy", "b"),
    ("cached", "c"),
    ("call", "c"),
    ("calls", "c"),
    ("code", "c"),
    ("collection", "c"),
    ("command", "c"),
    ("component", "c"),
    ("config", "c"),
    ("count", "c"),
    ("cpu", "c"),
    ("consumes", "cn"),
    ("data", "d"),
    ("datetime", "d"),
    ("default_value", "d"),
    ("disk", "d"),
    ("path_delimiter", "d"),
    ("allow_empty", "e"),
    ("entity_path", "e"),
    ("errors", "e"),
    ("error", "E"),
    ("enum", "em"),
    ("exclusive_minimum", "en"),
    ("exclusive_maximum", "ex"),
    ("family", "f"),
    ("filename", "f"),
    ("files", "f"),
    ("format", "f"),
    ("form_data", "f"),
    ("free", "f"),
    ("header", "h"),
    ("headers", "h"),
    ("id", "i"),
    ("idle", "i"),
    ("in", "i"),
    ("items", "i"),
    ("primary_key", "k"),
    ("laddr", "l"),
    ("level", "l"),
    ("links", "l"),
    ("memory", "m"),
    ("message", "m"),
    ("meta", "m"),
    ("method", "m"),
    ("mime", "m"),
    ("minimum", "mn"),
    ("multiple_of", "mo"),
    ("maximum", "mx"),
    ("name", "n"),
    ("network", "n"),
    ("minimum_items", "ni"),
    ("minimum_length", "nl"),
    ("origin", "o"),
    ("out", "o"),
    ("params", "p"),
    ("path", "p"),
    ("pattern", "p"),
    ("percent", "p"),
    ("pid", "p"),
    ("post_data", "p"),
    ("query", "q"),
    ("raddr", "r"),
    ("reads", "r"),
    ("request", "r"),
    ("required", "r"),
    ("relations", "r"),
    ("result", "r"),
    ("response", "R"),
    ("schema", "s"),
    ("schemes", "s"),
    ("scope", "s"),
    ("service", "s"),
    ("shared", "s"),
    ("size", "s"),
    ("status", "s"),
    ("swap", "s"),
    ("system", "s"),
    ("terminate", "t"),
    ("token", "t"),
    ("total", "t"),
    ("transactions", "t"),
    ("transport", "t"),
    ("type", "t"),
    ("url", "u"),
    ("used", "u"),
    ("user", "u"),
    ("userland", "u"),
    ("unique_items", "ui"),
    ("value", "v"),
    ("version", "v"),
    ("iowait", "w"),
    ("writes", "w"),
    ("execution_timeout", "x"),
    ("maximum_items", "xi"),
    ("maximum_length", "xl"),
];

/// A table from field names to their aliases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldMappings {
    aliases: HashMap<String, String>,
}

impl FieldMappings {
    pub fn new<I, K, V>(aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            aliases: aliases
                .into_iter()
                .map(|(name, alias)| (name.into(), alias.into()))
                .collect(),
        }
    }

    /// The platform's table, shared process-wide.
    pub fn standard() -> Arc<FieldMappings> {
        static STANDARD_MAPPINGS: OnceLock<Arc<FieldMappings>> = OnceLock::new();
        let mappings = STANDARD_MAPPINGS
            .get_or_init(|| Arc::new(FieldMappings::new(STANDARD.iter().copied())));
        Arc::clone(mappings)
    }

    /// Alias of `name`, if it has one.
    pub fn alias(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    /// Key `segment` resolves to in `map`, for reads and writes alike.
    pub(crate) fn key<'a>(&'a self, map: &BTreeMap<String, Value>, segment: &'a str) -> &'a str {
        if let Some(name) = segment.strip_prefix(NOMAP_PREFIX) {
            return name;
        }
        if map.contains_key(segment) {
            return segment;
        }
        self.alias(segment).unwrap_or(segment)
    }

    /// Rename aliased `fields` of a record back to their full names.
    ///
    /// A field is only renamed when the full name is absent, so records
    /// that already use full names are left alone.
    pub fn expand(&self, record: &mut Value, fields: &[&str]) {
        let Some(map) = record.as_map_mut() else {
            return;
        };
        for field in fields {
            if map.contains_key(*field) {
                continue;
            }
            let Some(alias) = self.alias(field) else {
                continue;
            };
            if let Some(value) = map.remove(alias) {
                map.insert((*field).to_string(), value);
            }
        }
    }
}

/// Escape `name` so that it is never mapped.
pub fn nomap(name: &str) -> String {
    format!("{}{}", NOMAP_PREFIX, name)
}
