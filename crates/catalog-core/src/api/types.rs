//! Catalog API request filters and response types.
//!
//! Individual catalog records are kept as raw JSON; the normalizer owns the
//! knowledge of their shape.

use serde::Deserialize;
use serde_json::Value;

/// Scalar filter value sent as a query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    /// Omitted from the query entirely
    Null,
}

impl FilterValue {
    /// Query string rendering, `None` for values that must not be sent
    pub fn to_query(&self) -> Option<String> {
        match self {
            FilterValue::Str(s) => Some(s.clone()),
            FilterValue::Int(i) => Some(i.to_string()),
            FilterValue::UInt(u) => Some(u.to_string()),
            FilterValue::Float(f) => Some(f.to_string()),
            FilterValue::Bool(b) => Some(b.to_string()),
            FilterValue::Null => None,
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Str(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Str(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::UInt(u64::from(value))
    }
}

impl From<u64> for FilterValue {
    fn from(value: u64) -> Self {
        FilterValue::UInt(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        FilterValue::Float(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FilterValue::Null)
    }
}

/// Ordered set of query filters; a later value for the same key replaces the earlier one
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    entries: Vec<(String, FilterValue)>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: &str, value: impl Into<FilterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<FilterValue>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Key/value pairs that go on the wire, in insertion order
    pub fn query_pairs(&self) -> Vec<(&str, String)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.to_query().map(|v| (k.as_str(), v)))
            .collect()
    }
}

/// Response of the list-shaped endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListResponse {
    pub results: Vec<Value>,
    pub total: u64,
}

impl ListResponse {
    /// Parse a decoded body; a missing `total` defaults to the result count
    pub fn from_body(body: &Value) -> Self {
        let results = body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = body
            .get("total")
            .and_then(Value::as_u64)
            .unwrap_or(results.len() as u64);
        Self { results, total }
    }
}

/// Dictionary entry of `/genres`, `/studios`, `/anime_types`, `/anime_statuses`
#[derive(Debug, Clone, Deserialize)]
pub struct TitledEntry {
    pub title: String,
    #[serde(default)]
    pub count: Option<u64>,
}

/// Dictionary entry of `/years`
#[derive(Debug, Clone, Deserialize)]
pub struct YearEntry {
    pub year: i32,
    #[serde(default)]
    pub count: Option<u64>,
}
