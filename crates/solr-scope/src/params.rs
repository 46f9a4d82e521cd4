//! Compiled wire parameters.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::value::fmt_float;

/// Value of one wire parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    /// Repeated parameter (`fq`, `facet.field`, `facet.query`).
    List(Vec<String>),
    Int(u64),
    Float(f64),
    Flag(bool),
}

impl ParamValue {
    /// Text value, if this is one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Repeated values, if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Integer value, if this is one.
    pub fn as_int(&self) -> Option<u64> {
        match self {
            ParamValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Float value, if this is one.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Flag value, if this is one.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Wire strings, one per repetition.
    pub fn wire_values(&self) -> Vec<String> {
        match self {
            ParamValue::List(items) => items.clone(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{}", s),
            ParamValue::List(items) => write!(f, "{}", items.join(",")),
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Float(n) => write!(f, "{}", fmt_float(*n)),
            ParamValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(items: Vec<String>) -> Self {
        ParamValue::List(items)
    }
}

impl From<u64> for ParamValue {
    fn from(n: u64) -> Self {
        ParamValue::Int(n)
    }
}

impl From<f64> for ParamValue {
    fn from(n: f64) -> Self {
        ParamValue::Float(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Flag(b)
    }
}

/// Ordered parameter map. Absent values are never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WireParams(IndexMap<String, ParamValue>);

impl WireParams {
    /// An empty parameter set.
    pub fn new() -> Self {
        WireParams::default()
    }

    /// Inserts or replaces a parameter, keeping its first position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Inserts `value` when present.
    pub fn insert_opt<V: Into<ParamValue>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.insert(key, value);
        }
    }

    /// One parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Text parameter.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_text)
    }

    /// List parameter.
    pub fn list(&self, key: &str) -> Option<&[String]> {
        self.get(key).and_then(ParamValue::as_list)
    }

    /// Whether the parameter is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Parameter names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Parameters in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattens into `(name, value)` pairs, repeating list parameters.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .flat_map(|(key, value)| {
                value
                    .wire_values()
                    .into_iter()
                    .map(move |v| (key.clone(), v))
            })
            .collect()
    }
}
