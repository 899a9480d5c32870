//! Serde shapes for the song file's `Song` section.

use crate::error::{DrumrollError, Result};
use serde::Deserialize;
use serde_yml::{Mapping, Value};
use std::collections::BTreeMap;

/// The `Song` section, after its keys have been lowercased.
#[derive(Debug, Deserialize)]
pub(super) struct SongHeader {
    pub tempo: f64,
    #[serde(default)]
    pub kit: Vec<BTreeMap<String, String>>,
    /// Older song files call the flow `Structure`.
    #[serde(default, alias = "structure")]
    pub flow: Vec<FlowEntry>,
}

/// One item of the flow list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum FlowEntry {
    /// `- Verse`
    Name(String),
    /// `- Verse: x2`
    Repeated(BTreeMap<String, Value>),
}

impl FlowEntry {
    /// Returns the pattern name and how many times it plays.
    pub fn resolve(&self) -> Result<(String, usize)> {
        match self {
            FlowEntry::Name(name) => Ok((name.clone(), 1)),
            FlowEntry::Repeated(entry) => {
                let mut items = entry.iter();
                match (items.next(), items.next()) {
                    (Some((name, count)), None) => Ok((name.clone(), repeat_count(name, count)?)),
                    _ => Err(DrumrollError::parse(
                        "flow",
                        "each flow entry must name exactly one pattern",
                    )),
                }
            }
        }
    }
}

/// Reads `x2`, `2` or an empty value (once).
fn repeat_count(name: &str, value: &Value) -> Result<usize> {
    let context = || format!("flow entry {:?}", name);
    let count = match value {
        Value::Null => Some(1),
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => {
            let s = s.trim();
            let digits = s
                .strip_prefix('x')
                .or_else(|| s.strip_prefix('X'))
                .unwrap_or(s);
            digits.parse::<usize>().ok()
        }
        _ => None,
    };
    match count {
        Some(0) => Err(DrumrollError::parse(context(), "repeat count must be at least 1")),
        Some(count) => Ok(count),
        None => Err(DrumrollError::parse(
            context(),
            format!("invalid repeat count {:?}", value),
        )),
    }
}

/// Returns a copy of `mapping` with every string key lowercased.
pub(super) fn lowercase_keys(mapping: &Mapping) -> Mapping {
    mapping
        .iter()
        .map(|(key, value)| {
            let key = match key {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other.clone(),
            };
            (key, value.clone())
        })
        .collect()
}

/// Reads a `- key: value` list item, the shape used by kits and patterns.
pub(super) fn single_entry<'a>(item: &'a Value, context: &str) -> Result<(&'a str, &'a Value)> {
    let mapping = item
        .as_mapping()
        .ok_or_else(|| DrumrollError::parse(context, "expected a `name: value` entry"))?;
    let mut entries = mapping.iter();
    match (entries.next(), entries.next()) {
        (Some((Value::String(key), value)), None) => Ok((key.as_str(), value)),
        _ => Err(DrumrollError::parse(
            context,
            "expected exactly one `name: value` pair",
        )),
    }
}
