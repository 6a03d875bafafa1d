//! Attribute maps for desired and observed configuration.
//!
//! Both the user's declared configuration and the observed remote
//! configuration are modeled as [`AttributeMap`]s: sorted maps of attribute
//! names to a closed set of value shapes. Sorted keys make every diff over
//! them deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Explicit absence of a value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
    /// Ordered collection; each element is addressed by its index.
    List(Vec<AttrValue>),
    /// Singleton nested block (0-or-1 cardinality).
    Block(AttributeMap),
}

/// Sorted map of attribute names to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeMap(BTreeMap<String, AttrValue>);

impl AttrValue {
    /// Returns true for [`AttrValue::Null`] and for empty blocks.
    ///
    /// Both count as "absent" for diffing purposes.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Block(block) => block.normalized().is_empty(),
            _ => false,
        }
    }

    /// Returns true for scalar values (everything except lists and blocks).
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_) | Self::Block(_))
    }

    /// Renders the value the way a string-typed patch protocol expects it.
    ///
    /// Floats use fixed notation (never an exponent), booleans are the
    /// literals `true` and `false`, lists and blocks are rendered as compact
    /// JSON whose numbers follow the same fixed notation. [`AttrValue::Null`]
    /// renders as `None`.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(if *b { "true" } else { "false" }.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(format_float(*f)),
            Self::String(s) => Some(s.clone()),
            Self::List(_) | Self::Block(_) => {
                let mut out = String::new();
                self.write_json(&mut out);
                Some(out)
            }
        }
    }

    /// Writes compact JSON, keeping floats out of scientific notation.
    fn write_json(&self, out: &mut String) {
        match self {
            Self::Null => out.push_str("null"),
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Int(i) => out.push_str(&i.to_string()),
            Self::Float(f) if f.is_finite() => out.push_str(&format_float(*f)),
            Self::Float(_) => out.push_str("null"),
            Self::String(s) => out.push_str(&serde_json::Value::String(s.clone()).to_string()),
            Self::List(items) => {
                out.push('[');
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    item.write_json(out);
                }
                out.push(']');
            }
            Self::Block(block) => {
                out.push('{');
                for (index, (key, value)) in block.iter().enumerate() {
                    if index > 0 {
                        out.push(',');
                    }
                    out.push_str(&serde_json::Value::String(key.clone()).to_string());
                    out.push(':');
                    value.write_json(out);
                }
                out.push('}');
            }
        }
    }

    /// Returns the string value, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the block, if this is a block.
    #[must_use]
    pub const fn as_block(&self) -> Option<&AttributeMap> {
        match self {
            Self::Block(block) => Some(block),
            _ => None,
        }
    }

    /// Converts the value to JSON.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Self::String(s) => serde_json::Value::String(s.clone()),
            Self::List(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Block(block) => block.to_json(),
        }
    }

    /// Builds a value from JSON.
    ///
    /// Objects become blocks, arrays become lists, integral numbers that fit
    /// in an `i64` become integers and every other number becomes a float.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Self::Float(n.as_f64().unwrap_or(f64::NAN)), Self::Int),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Self::Block(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    fn normalized(&self) -> Self {
        match self {
            Self::List(items) => Self::List(items.iter().map(Self::normalized).collect()),
            Self::Block(block) => Self::Block(block.normalized()),
            other => other.clone(),
        }
    }
}

/// Formats a float in fixed notation with the shortest round-tripping digits.
///
/// `0.5` renders as `0.5`, `2.0` as `2` and `1e21` as `1000000000000000000000`.
#[must_use]
pub fn format_float(value: f64) -> String {
    // Display for f64 never switches to scientific notation.
    format!("{value}")
}

impl AttributeMap {
    /// Creates an empty attribute map.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Gets an attribute value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.0.get(key)
    }

    /// Gets a mutable attribute value.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut AttrValue> {
        self.0.get_mut(key)
    }

    /// Sets an attribute value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Option<AttrValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Builder-style variant of [`AttributeMap::set`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Removes an attribute.
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.0.remove(key)
    }

    /// Returns true if the attribute is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterates attributes in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, AttrValue> {
        self.0.iter()
    }

    /// Iterates attribute names in order.
    pub fn keys(&self) -> btree_map::Keys<'_, String, AttrValue> {
        self.0.keys()
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a copy without absent values (nulls and empty blocks), recursively.
    ///
    /// Two maps that normalize to the same value are logically equal.
    #[must_use]
    pub fn normalized(&self) -> Self {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.normalized()))
            .filter(|(_, v)| !v.is_absent())
            .collect()
    }

    /// Converts the map to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Builds a map from a JSON object.
    ///
    /// Returns `None` if the value is not an object.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        value.as_object().map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), AttrValue::from_json(v)))
                .collect()
        })
    }

    /// Returns the subset of attributes whose names are listed.
    #[must_use]
    pub fn project<'a>(&self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        keys.into_iter()
            .filter_map(|k| self.0.get(k).map(|v| (k.to_string(), v.clone())))
            .collect()
    }
}

impl FromIterator<(String, AttrValue)> for AttributeMap {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = (&'a String, &'a AttrValue);
    type IntoIter = btree_map::Iter<'a, String, AttrValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<AttributeMap> for AttrValue {
    fn from(value: AttributeMap) -> Self {
        Self::Block(value)
    }
}

impl From<Vec<AttrValue>> for AttrValue {
    fn from(value: Vec<AttrValue>) -> Self {
        Self::List(value)
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render().unwrap_or_else(|| String::from("null")))
    }
}
