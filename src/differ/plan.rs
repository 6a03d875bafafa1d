//! Update plans: ordered patch operations.
//!
//! In memory, operations carry typed [`AttrValue`]s so that a plan can be
//! applied back onto an attribute map exactly. On the wire, values are
//! rendered as strings (`"2"`, `"0.5"`, `"true"`), the form string-typed
//! patch protocols expect.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::model::{AttrValue, AttributeMap};

/// Verb of a patch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchVerb {
    /// Insert a new value.
    Add,
    /// Overwrite an existing value.
    Replace,
    /// Remove an existing value.
    Remove,
}

/// One patch operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchOp {
    /// What to do.
    pub op: PatchVerb,
    /// JSON-Pointer path, including the plan prefix.
    pub path: String,
    /// New value; `None` for removals.
    pub value: Option<AttrValue>,
}

/// Wire form of a [`PatchOp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireOp {
    /// Verb.
    pub op: PatchVerb,
    /// JSON-Pointer path.
    pub path: String,
    /// Rendered value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Ordered, deterministic sequence of patch operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdatePlan {
    prefix: String,
    ops: Vec<PatchOp>,
}

impl PatchOp {
    /// Creates an `add` operation.
    #[must_use]
    pub fn add(path: impl Into<String>, value: AttrValue) -> Self {
        Self {
            op: PatchVerb::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    /// Creates a `replace` operation.
    #[must_use]
    pub fn replace(path: impl Into<String>, value: AttrValue) -> Self {
        Self {
            op: PatchVerb::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    /// Creates a `remove` operation.
    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchVerb::Remove,
            path: path.into(),
            value: None,
        }
    }

    /// Converts to the string-valued wire form.
    #[must_use]
    pub fn to_wire(&self) -> WireOp {
        WireOp {
            op: self.op,
            path: self.path.clone(),
            value: self.value.as_ref().and_then(AttrValue::render),
        }
    }
}

impl From<WireOp> for PatchOp {
    /// Rendered JSON objects and arrays become blocks and lists again; every
    /// other value stays a string.
    fn from(wire: WireOp) -> Self {
        Self {
            op: wire.op,
            path: wire.path,
            value: wire.value.map(parse_wire_value),
        }
    }
}

fn parse_wire_value(raw: String) -> AttrValue {
    if raw.starts_with(['{', '[']) {
        if let Ok(value @ (serde_json::Value::Object(_) | serde_json::Value::Array(_))) =
            serde_json::from_str::<serde_json::Value>(&raw)
        {
            return AttrValue::from_json(&value);
        }
    }
    AttrValue::String(raw)
}

impl Serialize for PatchOp {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

impl UpdatePlan {
    /// Creates an empty plan whose paths start with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ops: Vec::new(),
        }
    }

    /// Builds a plan from wire operations.
    ///
    /// # Errors
    ///
    /// Returns `InvalidResponse` if `value` is not an array of operations.
    pub fn from_wire(prefix: impl Into<String>, value: &serde_json::Value) -> Result<Self> {
        let wire: Vec<WireOp> = serde_json::from_value(value.clone())
            .map_err(|e| EngineError::invalid_response(format!("invalid patch document: {e}")))?;
        Ok(Self {
            prefix: prefix.into(),
            ops: wire.into_iter().map(PatchOp::from).collect(),
        })
    }

    /// Appends an operation.
    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    /// Path prefix shared by every operation.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Operations in application order.
    #[must_use]
    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    /// Returns true if the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Wire form as a JSON array.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.ops
                .iter()
                .filter_map(|op| serde_json::to_value(op.to_wire()).ok())
                .collect(),
        )
    }

    /// Applies the plan to `old`, returning the patched copy.
    ///
    /// # Errors
    ///
    /// Returns an internal error if an operation addresses a path that does
    /// not exist in `old` (or in the map as patched so far).
    pub fn apply_to(&self, old: &AttributeMap) -> Result<AttributeMap> {
        let mut patched = old.clone();
        for op in &self.ops {
            let segments = self.segments(&op.path)?;
            apply_in_map(&mut patched, &segments, op)
                .map_err(|reason| EngineError::internal(format!("cannot apply {:?} {}: {reason}", op.op, op.path)))?;
        }
        Ok(patched)
    }

    fn segments(&self, path: &str) -> Result<Vec<String>> {
        let relative = path
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| EngineError::internal(format!("path {path} is outside prefix {:?}", self.prefix)))?;
        Ok(relative.split('/').map(unescape_segment).collect())
    }
}

impl Serialize for UpdatePlan {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.ops.serialize(serializer)
    }
}

impl<'a> IntoIterator for &'a UpdatePlan {
    type Item = &'a PatchOp;
    type IntoIter = std::slice::Iter<'a, PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

impl std::fmt::Display for PatchVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PatchOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value.as_ref().and_then(AttrValue::render) {
            Some(value) => write!(f, "{} {} = {value}", self.op, self.path),
            None => write!(f, "{} {}", self.op, self.path),
        }
    }
}

/// Escapes one JSON-Pointer segment (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Reverses [`escape_segment`].
#[must_use]
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

fn apply_in_map(map: &mut AttributeMap, segments: &[String], op: &PatchOp) -> std::result::Result<(), String> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(String::from("empty path"));
    };

    if rest.is_empty() {
        return match (op.op, &op.value) {
            (PatchVerb::Add | PatchVerb::Replace, Some(value)) => {
                map.set(head.clone(), value.clone());
                Ok(())
            }
            (PatchVerb::Add | PatchVerb::Replace, None) => Err(String::from("missing value")),
            (PatchVerb::Remove, _) => map
                .remove(head)
                .map(|_| ())
                .ok_or_else(|| format!("no attribute {head}")),
        };
    }

    let child = map.get_mut(head).ok_or_else(|| format!("no attribute {head}"))?;
    apply_in_value(child, rest, op)
}

fn apply_in_value(value: &mut AttrValue, segments: &[String], op: &PatchOp) -> std::result::Result<(), String> {
    match value {
        AttrValue::Block(block) => apply_in_map(block, segments, op),
        AttrValue::List(items) => apply_in_list(items, segments, op),
        _ => Err(String::from("path descends into a scalar")),
    }
}

fn apply_in_list(items: &mut Vec<AttrValue>, segments: &[String], op: &PatchOp) -> std::result::Result<(), String> {
    let Some((head, rest)) = segments.split_first() else {
        return Err(String::from("empty path"));
    };
    let index: usize = head.parse().map_err(|_| format!("invalid list index {head}"))?;

    if !rest.is_empty() {
        let child = items.get_mut(index).ok_or_else(|| format!("index {index} out of range"))?;
        return apply_in_value(child, rest, op);
    }

    match (op.op, &op.value) {
        (PatchVerb::Add, Some(value)) if index <= items.len() => {
            items.insert(index, value.clone());
            Ok(())
        }
        (PatchVerb::Replace, Some(value)) if index < items.len() => {
            items[index] = value.clone();
            Ok(())
        }
        (PatchVerb::Remove, _) if index < items.len() => {
            items.remove(index);
            Ok(())
        }
        _ => Err(format!("index {index} out of range")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form_renders_values() {
        let op = PatchOp::replace("/size", AttrValue::Int(2));
        assert_eq!(
            serde_json::to_string(&op).unwrap(),
            r#"{"op":"replace","path":"/size","value":"2"}"#
        );

        let op = PatchOp::remove("/name");
        assert_eq!(serde_json::to_string(&op).unwrap(), r#"{"op":"remove","path":"/name"}"#);
    }

    #[test]
    fn test_escape_roundtrip() {
        assert_eq!(escape_segment("a/b~c"), "a~1b~0c");
        assert_eq!(unescape_segment("a~1b~0c"), "a/b~c");
        // "~01" is an escaped "~1", not an escaped "/".
        assert_eq!(unescape_segment("~01"), "~1");
    }

    #[test]
    fn test_apply_nested_and_list() {
        let old = AttributeMap::new()
            .with("cache", AttributeMap::new().with("ttl", 60))
            .with("zones", vec![AttrValue::from("a"), AttrValue::from("b")]);

        let mut plan = UpdatePlan::new("");
        plan.push(PatchOp::replace("/cache/ttl", AttrValue::Int(300)));
        plan.push(PatchOp::remove("/zones/1"));
        plan.push(PatchOp::add("/zones/1", AttrValue::from("c")));

        let patched = plan.apply_to(&old).unwrap();
        let expected = AttributeMap::new()
            .with("cache", AttributeMap::new().with("ttl", 300))
            .with("zones", vec![AttrValue::from("a"), AttrValue::from("c")]);
        assert_eq!(patched, expected);
    }

    #[test]
    fn test_apply_with_prefix() {
        let mut plan = UpdatePlan::new("/settings");
        plan.push(PatchOp::add("/settings/a~1b", AttrValue::Bool(true)));
        let patched = plan.apply_to(&AttributeMap::new()).unwrap();
        assert_eq!(patched.get("a/b"), Some(&AttrValue::Bool(true)));

        let mut plan = UpdatePlan::new("/settings");
        plan.push(PatchOp::add("/other/x", AttrValue::Bool(true)));
        assert!(plan.apply_to(&AttributeMap::new()).is_err());
    }

    #[test]
    fn test_apply_rejects_missing_target() {
        let mut plan = UpdatePlan::new("");
        plan.push(PatchOp::remove("/missing"));
        assert!(plan.apply_to(&AttributeMap::new()).is_err());
    }

    #[test]
    fn test_from_wire() {
        let wire = serde_json::json!([{"op": "replace", "path": "/size", "value": "2"}, {"op": "remove", "path": "/x"}]);
        let plan = UpdatePlan::from_wire("", &wire).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.ops()[0].value, Some(AttrValue::from("2")));
        assert_eq!(plan.ops()[1].op, PatchVerb::Remove);

        assert!(UpdatePlan::from_wire("", &serde_json::json!({"op": "add"})).is_err());
    }

    #[test]
    fn test_from_wire_restores_containers() {
        let wire = serde_json::json!([
            {"op": "add", "path": "/cache", "value": "{}"},
            {"op": "add", "path": "/cache/ratio", "value": "0.0000001"},
            {"op": "add", "path": "/note", "value": "[not json"},
        ]);
        let plan = UpdatePlan::from_wire("", &wire).unwrap();
        let patched = plan.apply_to(&AttributeMap::new()).unwrap();

        assert_eq!(
            patched.get("cache").and_then(AttrValue::as_block).and_then(|b| b.get("ratio")),
            Some(&AttrValue::from("0.0000001"))
        );
        assert_eq!(patched.get("note"), Some(&AttrValue::from("[not json")));
    }
}
