//! Per-feature output records

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use zonestat_core::AttributeValue;

/// A single statistic value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Undefined, e.g. over an empty selection
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl StatValue {
    pub fn is_null(&self) -> bool {
        matches!(self, StatValue::Null)
    }

    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Int(i) => Some(*i as f64),
            StatValue::Float(f) => Some(*f),
            StatValue::Null | StatValue::Text(_) => None,
        }
    }
}

impl From<Option<f64>> for StatValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or(StatValue::Null, StatValue::Float)
    }
}

impl From<f64> for StatValue {
    fn from(value: f64) -> Self {
        StatValue::Float(value)
    }
}

impl From<i64> for StatValue {
    fn from(value: i64) -> Self {
        StatValue::Int(value)
    }
}

impl From<&str> for StatValue {
    fn from(value: &str) -> Self {
        StatValue::Text(value.to_string())
    }
}

impl From<StatValue> for AttributeValue {
    fn from(value: StatValue) -> Self {
        match value {
            StatValue::Null => AttributeValue::Null,
            StatValue::Int(i) => AttributeValue::Int(i),
            StatValue::Float(f) => AttributeValue::Float(f),
            StatValue::Text(s) => AttributeValue::String(s),
        }
    }
}

impl fmt::Display for StatValue {
    /// CSV-friendly rendering: null is empty
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Null => Ok(()),
            StatValue::Int(i) => write!(f, "{i}"),
            StatValue::Float(v) => write!(f, "{v}"),
            StatValue::Text(s) => f.write_str(s),
        }
    }
}

/// A raster value used as a categorical histogram key.
///
/// Ordered numerically (NaN sorts last).
#[derive(Debug, Clone, Copy)]
pub struct CategoryKey(pub f64);

impl PartialEq for CategoryKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CategoryKey {}

impl PartialOrd for CategoryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CategoryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for CategoryKey {
    fn from(value: f64) -> Self {
        // fold -0.0 into 0.0 so both land in one bin
        CategoryKey(if value == 0.0 { 0.0 } else { value })
    }
}

impl fmt::Display for CategoryKey {
    /// Whole values keep one decimal (`1.0`), others print as-is
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_finite() && self.0.fract() == 0.0 {
            write!(f, "{:.1}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Statistics for one feature: an ordered map from name to value.
///
/// Keys keep insertion order; serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatRecord {
    entries: Vec<(String, StatValue)>,
}

impl StatRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any existing value under the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StatValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&StatValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Numeric value under `key`, `None` when missing or null
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(StatValue::as_f64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StatValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of the record with `prefix` prepended to every key
    pub fn with_prefix(&self, prefix: &str) -> StatRecord {
        StatRecord {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (format!("{prefix}{k}"), v.clone()))
                .collect(),
        }
    }
}

impl IntoIterator for StatRecord {
    type Item = (String, StatValue);
    type IntoIter = std::vec::IntoIter<(String, StatValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, StatValue)> for StatRecord {
    fn from_iter<I: IntoIterator<Item = (String, StatValue)>>(iter: I) -> Self {
        let mut record = StatRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for StatRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
