//! A tagged representation of the loosely-shaped records returned by the remote service.

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// One node of a raw record. Notion property values nest mappings and lists freely, and which
/// one you get for a given key depends on the property type, so lookups go through `traverse`
/// instead of assuming a shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RawValue {
    #[default]
    Null,
    Scalar(Scalar),
    List(Vec<RawValue>),
    Mapping(BTreeMap<String, RawValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl RawValue {
    /// Looks up `key` when this is a mapping.
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        match self {
            RawValue::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    /// Walks `path` from this value and renders whatever is found as text.
    ///
    /// At every step a list is replaced by its first element (an empty list by an empty mapping)
    /// before descending by key. Stepping into anything that is not a mapping, or a missing key,
    /// yields the empty string. The value at the end of the path is rendered only if it is a
    /// scalar.
    pub fn traverse(&self, path: &[&str]) -> String {
        let mut current = Some(self);
        for key in path {
            current = current.map(first_of_list).and_then(|v| v.get(key));
        }
        match current {
            Some(RawValue::Scalar(s)) => s.to_string(),
            _ => String::new(),
        }
    }

    /// The value as a number if it is a numeric scalar.
    pub fn as_number(&self) -> Option<&serde_json::Number> {
        match self {
            RawValue::Scalar(Scalar::Number(n)) => Some(n),
            _ => None,
        }
    }
}

/// For a list, the first element, or an empty mapping when there is none. Anything else is
/// returned unchanged.
fn first_of_list(value: &RawValue) -> &RawValue {
    static EMPTY: RawValue = RawValue::Null;
    match value {
        // An empty mapping and `Null` behave the same from here on: every key is missing.
        RawValue::List(items) => items.first().unwrap_or(&EMPTY),
        other => other,
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<serde_json::Value> for RawValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => RawValue::Scalar(Scalar::Number(n)),
            Value::String(s) => RawValue::Scalar(Scalar::Text(s)),
            Value::Array(items) => RawValue::List(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => RawValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(RawValue::from)
    }
}
