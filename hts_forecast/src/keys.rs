//! Structured composite keys for hierarchy series
//!
//! Series are identified internally by an ordered tuple of key values. The
//! `/`-joined string form (`unique_id`) is only produced at the file and
//! table boundaries.

use crate::error::{HtsError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when rendering a composite key as a `unique_id`
pub const KEY_SEPARATOR: char = '/';

/// Rendering of a missing key component
pub const MISSING_LABEL: &str = "NA";

/// One component of a composite key
///
/// A null grouping cell is kept as its own category rather than dropped, so
/// rows with missing keys never merge into an unrelated series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum KeyValue {
    Value(String),
    Missing,
}

impl KeyValue {
    /// Build a key component from a raw cell; empty cells are missing
    pub fn from_cell(cell: Option<&str>) -> Self {
        match cell.map(str::trim) {
            Some(s) if !s.is_empty() => KeyValue::Value(s.to_string()),
            _ => KeyValue::Missing,
        }
    }

    /// The raw value, `None` when missing
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KeyValue::Value(s) => Some(s),
            KeyValue::Missing => None,
        }
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Value(value.to_string())
    }
}

impl From<Option<String>> for KeyValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => KeyValue::Value(s),
            None => KeyValue::Missing,
        }
    }
}

impl From<KeyValue> for Option<String> {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::Value(s) => Some(s),
            KeyValue::Missing => None,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Value(s) => f.write_str(s),
            KeyValue::Missing => f.write_str(MISSING_LABEL),
        }
    }
}

/// Ordered tuple of key values identifying one series of the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesKey(Vec<KeyValue>);

impl SeriesKey {
    pub fn new(parts: Vec<KeyValue>) -> Self {
        Self(parts)
    }

    pub fn parts(&self) -> &[KeyValue] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The key of the ancestor with `depth` components
    pub fn prefix(&self, depth: usize) -> SeriesKey {
        SeriesKey(self.0[..depth.min(self.0.len())].to_vec())
    }

    /// Whether `self` is an ancestor-or-self of `other`
    pub fn is_prefix_of(&self, other: &SeriesKey) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Render as a `unique_id` string
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", KEY_SEPARATOR)?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl<S: AsRef<str>> FromIterator<S> for SeriesKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        SeriesKey(
            iter.into_iter()
                .map(|s| KeyValue::from(s.as_ref()))
                .collect(),
        )
    }
}

/// Split a rendered `unique_id` back into exactly `expected` components
pub fn split_unique_id(unique_id: &str, expected: usize) -> Result<Vec<String>> {
    let parts: Vec<String> = unique_id.split(KEY_SEPARATOR).map(str::to_string).collect();
    if parts.len() != expected {
        return Err(HtsError::KeySplit {
            unique_id: unique_id.to_string(),
            expected,
            found: parts.len(),
        });
    }
    Ok(parts)
}
