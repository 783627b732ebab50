//! Directive extraction.
//!
//! A request for an image carries its directives as a URL query:
//!
//! ```text
//! photo.jpg?w=300;600;900&format=avif;webp&as=picture
//! ```
//!
//! Each key maps to one or more candidate values separated by `;`. The
//! [`DirectiveSet`] keeps keys in the order they first appeared, because that
//! order decides how the variants are enumerated (see [`crate::resolve`]).
//!
//! Parsing never fails. Anything that is not a well-formed escape is kept
//! verbatim, and validating values is left to the transform factories.

use std::fmt;
use url::form_urlencoded;

/// Separator between candidate values of one directive.
pub const VALUE_SEPARATOR: char = ';';

/// Ordered mapping from directive name to its candidate values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectiveSet {
    entries: Vec<(String, Vec<String>)>,
}

impl DirectiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(key, raw value)` pairs, splitting each value on `;`.
    ///
    /// A repeated key replaces the earlier values but keeps its original
    /// position.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut set = Self::new();
        for (key, value) in pairs {
            set.set(key, split_values(value.as_ref()));
        }
        set
    }

    /// Parse an `a=1&b=2;3` query string. A leading `?` is ignored, `+`
    /// decodes to a space and `%XX` escapes are decoded. A key without `=` is
    /// a keyword with the single value `""`.
    pub fn parse_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    /// Return a set where keys absent from `self` are filled in from
    /// `defaults`, appended in the defaults' order. Keys present in `self`
    /// always win.
    pub fn merge_defaults(&self, defaults: &DirectiveSet) -> DirectiveSet {
        let mut merged = self.clone();
        for (key, values) in &defaults.entries {
            if !merged.contains(key) {
                merged.entries.push((key.clone(), values.clone()));
            }
        }
        merged
    }

    /// Replace the values of `key`, or append it if it is new.
    pub fn set(&mut self, key: impl Into<String>, values: Vec<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = values,
            None => self.entries.push((key, values)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First candidate of `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Serialize back to a query string that [`parse_query`](Self::parse_query)
    /// reads as the same set.
    pub fn to_query(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.entries {
            match values.as_slice() {
                [only] if only.is_empty() => serializer.append_key_only(key),
                _ => serializer.append_pair(key, &values.join(&VALUE_SEPARATOR.to_string())),
            };
        }
        serializer.finish()
    }
}

impl fmt::Display for DirectiveSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query())
    }
}

fn split_values(raw: &str) -> Vec<String> {
    raw.split(VALUE_SEPARATOR).map(String::from).collect()
}
