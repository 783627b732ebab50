//! Config resolution: from multi-valued directives to concrete variants.
//!
//! A [`DirectiveSet`] may list several candidates per key. Resolution expands
//! it into the cartesian product of single-valued [`ResolvedConfig`]s, one per
//! variant to produce, and extracts the output selector (`as`) which is not
//! part of any variant.
//!
//! ## Enumeration order
//!
//! The product is enumerated as nested loops in directive order, so the first
//! directive varies slowest:
//!
//! ```text
//! w=300;900&format=webp;jpeg
//!   → (300, webp) (300, jpeg) (900, webp) (900, jpeg)
//! ```
//!
//! Output synthesis relies on this order (e.g. the first of several equally
//! wide variants becomes the `<img>` fallback).
//!
//! ## Output selector
//!
//! `as=<name>[:<p1>;<p2>…]` names the output format and its parameters. The
//! `;` inside the parameters was split by directive extraction, so the values
//! are re-joined before parsing. Without `as`, a bare key naming a registered
//! output format (`&srcset`, `&metadata=width;height`) selects it instead.

use crate::directives::{DirectiveSet, VALUE_SEPARATOR};
use crate::output::OutputFormats;
use crate::transforms::parse::int_prefix;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Directive naming the output format.
pub const OUTPUT_KEY: &str = "as";

/// One concrete variant: each directive reduced to a single value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedConfig {
    entries: Vec<(String, String)>,
}

impl ResolvedConfig {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            match config.entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, existing)) => *existing = value,
                None => config.entries.push((key, value)),
            }
        }
        config
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable serialization with keys sorted, independent of directive order.
    pub fn canonical_json(&self) -> String {
        let sorted: BTreeMap<&str, &str> = self.iter().collect();
        serde_json::to_string(&sorted).unwrap_or_default()
    }
}

impl Serialize for ResolvedConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// `key=value` pairs joined by `&`; keywords are written bare.
impl fmt::Display for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("&")?;
            }
            if value.is_empty() {
                write!(f, "{key}")?;
            } else {
                write!(f, "{key}={value}")?;
            }
        }
        Ok(())
    }
}

/// Requested output format and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSelector {
    pub name: String,
    pub params: Option<Vec<String>>,
}

impl OutputSelector {
    /// Parse `<name>[:<p1>;<p2>…]`. An empty parameter list is `None`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((name, params)) if !params.is_empty() => Self {
                name: name.to_string(),
                params: Some(params.split(VALUE_SEPARATOR).map(String::from).collect()),
            },
            Some((name, _)) => Self {
                name: name.to_string(),
                params: None,
            },
            None => Self {
                name: raw.to_string(),
                params: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Variants in enumeration order.
    pub configs: Vec<ResolvedConfig>,
    pub output: Option<OutputSelector>,
}

fn shorthand_selector(name: &str, values: &[String]) -> OutputSelector {
    let params: Vec<String> = values.iter().filter(|v| !v.is_empty()).cloned().collect();
    OutputSelector {
        name: name.to_string(),
        params: (!params.is_empty()).then_some(params),
    }
}

/// Expand `directives` into one [`ResolvedConfig`] per combination of
/// candidate values.
///
/// The product size is the product of the value-list lengths of every
/// directive except output selectors. A set with no such directive still
/// yields one empty config.
pub fn resolve_configs(directives: &DirectiveSet, formats: &OutputFormats) -> Resolution {
    let mut output = directives
        .get(OUTPUT_KEY)
        .map(|values| OutputSelector::parse(&values.join(&VALUE_SEPARATOR.to_string())));

    let mut configs: Vec<Vec<(&str, &str)>> = vec![Vec::new()];
    for (key, values) in directives.iter() {
        if key == OUTPUT_KEY {
            continue;
        }
        if formats.contains(key) {
            if output.is_none() {
                output = Some(shorthand_selector(key, values));
            }
            continue;
        }
        if values.is_empty() {
            continue;
        }
        configs = configs
            .into_iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    let mut next = prefix.clone();
                    next.push((key, value.as_str()));
                    next
                })
            })
            .collect();
    }

    Resolution {
        configs: configs.into_iter().map(ResolvedConfig::from_pairs).collect(),
        output,
    }
}

fn allows_upscale(directives: &DirectiveSet) -> bool {
    matches!(directives.first("allowUpscale"), Some("" | "true"))
}

fn clamp_values(values: &[String], limit: u32) -> Vec<String> {
    let mut clamped: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = match int_prefix(value) {
            Some(n) if n > i64::from(limit) => limit.to_string(),
            _ => value.clone(),
        };
        if !clamped.contains(&value) {
            clamped.push(value);
        }
    }
    clamped
}

/// Clamp `w` / `h` candidates to the intrinsic size of the source.
///
/// Unless `allowUpscale` is set, every candidate whose integer prefix exceeds
/// the intrinsic dimension becomes that dimension, and duplicates are dropped
/// keeping the first occurrence. Non-numeric candidates are left for the
/// resize factory to reject.
pub fn clamp_to_intrinsic(directives: &mut DirectiveSet, width: u32, height: u32) {
    if allows_upscale(directives) {
        return;
    }
    for (key, limit) in [("w", width), ("h", height)] {
        if let Some(values) = directives.get(key) {
            let clamped = clamp_values(values, limit);
            directives.set(key, clamped);
        }
    }
}
