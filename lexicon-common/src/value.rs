//! Terminology value model
//!
//! A terminology value is a scalar (string, number, boolean), an opaque array
//! leaf, or a nested object of further values. `null` is never a valid value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

/// Nested terminology tree, keyed by path segment
pub type TermMap = BTreeMap<String, TermValue>;

/// Flat terminology map, keyed by dot-delimited path
pub type FlatTermMap = BTreeMap<String, TermValue>;

/// A single terminology value
///
/// Arrays are kept as opaque leaves: flatten and merge never look inside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<serde_json::Value>),
    Object(TermMap),
}

impl TermValue {
    /// Convert a JSON value, rejecting `null` anywhere in the tree
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Null => Err(Error::InvalidInput(
                "null is not a valid terminology value".to_string(),
            )),
            serde_json::Value::Bool(b) => Ok(TermValue::Bool(b)),
            serde_json::Value::Number(n) => Ok(TermValue::Number(n)),
            serde_json::Value::String(s) => Ok(TermValue::String(s)),
            serde_json::Value::Array(items) => Ok(TermValue::Array(items)),
            serde_json::Value::Object(fields) => {
                let mut map = TermMap::new();
                for (key, field) in fields {
                    map.insert(key, TermValue::from_json(field)?);
                }
                Ok(TermValue::Object(map))
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TermValue::Bool(b) => serde_json::Value::Bool(*b),
            TermValue::Number(n) => serde_json::Value::Number(n.clone()),
            TermValue::String(s) => serde_json::Value::String(s.clone()),
            TermValue::Array(items) => serde_json::Value::Array(items.clone()),
            TermValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, TermValue::Object(_))
    }

    pub fn as_object(&self) -> Option<&TermMap> {
        match self {
            TermValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TermValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TermValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermValue::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for TermValue {
    fn from(value: &str) -> Self {
        TermValue::String(value.to_string())
    }
}

impl From<String> for TermValue {
    fn from(value: String) -> Self {
        TermValue::String(value)
    }
}

impl From<bool> for TermValue {
    fn from(value: bool) -> Self {
        TermValue::Bool(value)
    }
}

impl From<i64> for TermValue {
    fn from(value: i64) -> Self {
        TermValue::Number(value.into())
    }
}

impl From<TermMap> for TermValue {
    fn from(value: TermMap) -> Self {
        TermValue::Object(value)
    }
}

/// Convert a JSON object into a nested terminology tree
pub fn term_map_from_json(value: serde_json::Value) -> Result<TermMap> {
    match TermValue::from_json(value)? {
        TermValue::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "expected a terminology object, got {}",
            other
        ))),
    }
}

/// Convert a nested terminology tree into a JSON object
pub fn term_map_to_json(map: &TermMap) -> serde_json::Value {
    TermValue::Object(map.clone()).to_json()
}
