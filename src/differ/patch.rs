//! JSON-Patch style differ.

use tracing::debug;

use crate::model::{AttrValue, AttributeMap};

use super::plan::{PatchOp, UpdatePlan, escape_segment};

/// Computes `add`/`replace`/`remove` operations between two attribute maps.
///
/// Both maps are normalized first, so nulls and empty blocks count as
/// absent. Keys are visited in sorted order; the output is deterministic.
///
/// - A key only in `old` becomes one `remove`.
/// - A key only in `new` becomes one `add`. A new block or list is added
///   empty and then filled with one `add` per field or element.
/// - A changed scalar becomes one `replace`.
/// - A block present on both sides is diffed field by field.
/// - A list present on both sides is diffed element by element; surplus
///   elements are added in ascending or removed in descending index order.
#[derive(Debug, Clone, Default)]
pub struct PatchDiffer {
    /// Path prefix prepended to every operation, e.g. `/settings`.
    prefix: String,
}

impl PatchDiffer {
    /// Creates a differ with the given path prefix.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Computes the plan that turns `old` into `new`.
    #[must_use]
    pub fn diff(&self, old: &AttributeMap, new: &AttributeMap) -> UpdatePlan {
        let mut plan = UpdatePlan::new(self.prefix.clone());
        diff_maps(&self.prefix, &old.normalized(), &new.normalized(), &mut plan);
        debug!("Patch diff produced {} operation(s)", plan.len());
        plan
    }
}

fn diff_maps(path: &str, old: &AttributeMap, new: &AttributeMap, plan: &mut UpdatePlan) {
    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();

    for key in keys {
        let key_path = format!("{path}/{}", escape_segment(key));
        match (old.get(key), new.get(key)) {
            (Some(_), None) => plan.push(PatchOp::remove(key_path)),
            (None, Some(value)) => add_value(&key_path, value, plan),
            (Some(before), Some(after)) => diff_values(&key_path, before, after, plan),
            (None, None) => {}
        }
    }
}

fn diff_values(path: &str, old: &AttrValue, new: &AttrValue, plan: &mut UpdatePlan) {
    if old == new {
        return;
    }
    match (old, new) {
        (AttrValue::Block(before), AttrValue::Block(after)) => diff_maps(path, before, after, plan),
        (AttrValue::List(before), AttrValue::List(after)) => diff_lists(path, before, after, plan),
        _ => plan.push(PatchOp::replace(path, new.clone())),
    }
}

fn add_value(path: &str, value: &AttrValue, plan: &mut UpdatePlan) {
    match value {
        AttrValue::Block(block) => {
            plan.push(PatchOp::add(path, AttrValue::Block(AttributeMap::new())));
            diff_maps(path, &AttributeMap::new(), block, plan);
        }
        AttrValue::List(items) => {
            plan.push(PatchOp::add(path, AttrValue::List(Vec::new())));
            diff_lists(path, &[], items, plan);
        }
        scalar => plan.push(PatchOp::add(path, scalar.clone())),
    }
}

fn diff_lists(path: &str, old: &[AttrValue], new: &[AttrValue], plan: &mut UpdatePlan) {
    let common = old.len().min(new.len());

    for (index, (before, after)) in old.iter().zip(new).enumerate() {
        diff_values(&format!("{path}/{index}"), before, after, plan);
    }

    for (index, value) in new.iter().enumerate().skip(common) {
        add_value(&format!("{path}/{index}"), value, plan);
    }

    for index in (common..old.len()).rev() {
        plan.push(PatchOp::remove(format!("{path}/{index}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::PatchVerb;

    fn ops(plan: &UpdatePlan) -> Vec<String> {
        plan.ops().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_scalar_changes() {
        let old = AttributeMap::new().with("name", "a").with("size", 1).with("gone", true);
        let new = AttributeMap::new().with("name", "a").with("size", 2).with("fresh", 0.5);

        let plan = PatchDiffer::default().diff(&old, &new);
        assert_eq!(
            ops(&plan),
            ["add /fresh = 0.5", "remove /gone", "replace /size = 2"]
        );
    }

    #[test]
    fn test_size_change_wire_form() {
        let old = AttributeMap::new().with("name", "a").with("size", 1);
        let new = AttributeMap::new().with("name", "a").with("size", 2);

        let plan = PatchDiffer::default().diff(&old, &new);
        assert_eq!(
            plan.to_json().to_string(),
            r#"[{"op":"replace","path":"/size","value":"2"}]"#
        );
    }

    #[test]
    fn test_float_never_uses_exponent() {
        let old = AttributeMap::new().with("ratio", 0.25);
        let new = AttributeMap::new().with("ratio", 0.5);
        let json = PatchDiffer::default().diff(&old, &new).to_json().to_string();
        assert!(json.contains(r#""value":"0.5""#), "{json}");
        assert!(!json.contains('e'), "{json}");
    }

    #[test]
    fn test_block_removed_is_single_remove() {
        let old = AttributeMap::new().with(
            "logging",
            AttributeMap::new().with("level", "info").with("format", "json"),
        );
        let new = AttributeMap::new().with("logging", AttributeMap::new());

        let plan = PatchDiffer::new("/settings").diff(&old, &new);
        assert_eq!(ops(&plan), ["remove /settings/logging"]);
    }

    #[test]
    fn test_block_recurses_field_by_field() {
        let old = AttributeMap::new().with(
            "logging",
            AttributeMap::new().with("level", "info").with("format", "json"),
        );
        let new = AttributeMap::new().with("logging", AttributeMap::new().with("level", "debug"));

        let plan = PatchDiffer::default().diff(&old, &new);
        assert_eq!(
            ops(&plan),
            ["remove /logging/format", "replace /logging/level = debug"]
        );
    }

    #[test]
    fn test_new_block_is_added_field_by_field() {
        let new = AttributeMap::new().with("cache", AttributeMap::new().with("ttl", 60));
        let plan = PatchDiffer::default().diff(&AttributeMap::new(), &new);
        assert!(plan.ops().iter().all(|op| op.op == PatchVerb::Add));
        assert_eq!(ops(&plan), ["add /cache = {}", "add /cache/ttl = 60"]);
        assert_eq!(plan.apply_to(&AttributeMap::new()).unwrap(), new);
    }

    #[test]
    fn test_nested_floats_never_use_exponent() {
        let new = AttributeMap::new()
            .with("cache", AttributeMap::new().with("ratio", 1e-7))
            .with("weights", vec![AttrValue::Float(1e21)]);
        let plan = PatchDiffer::default().diff(&AttributeMap::new(), &new);

        assert_eq!(
            plan.to_json().to_string(),
            concat!(
                r#"[{"op":"add","path":"/cache","value":"{}"},"#,
                r#"{"op":"add","path":"/cache/ratio","value":"0.0000001"},"#,
                r#"{"op":"add","path":"/weights","value":"[]"},"#,
                r#"{"op":"add","path":"/weights/0","value":"1000000000000000000000"}]"#
            )
        );
    }

    #[test]
    fn test_list_elements_are_index_addressed() {
        let old = AttributeMap::new().with(
            "zones",
            vec![AttrValue::from("a"), AttrValue::from("b"), AttrValue::from("c")],
        );
        let new = AttributeMap::new().with("zones", vec![AttrValue::from("a"), AttrValue::from("x")]);

        let plan = PatchDiffer::default().diff(&old, &new);
        assert_eq!(ops(&plan), ["replace /zones/1 = x", "remove /zones/2"]);
        assert_eq!(plan.apply_to(&old).unwrap(), new);
    }

    #[test]
    fn test_keys_are_pointer_escaped() {
        let new = AttributeMap::new().with("a/b", "1").with("c~d", "2");
        let plan = PatchDiffer::default().diff(&AttributeMap::new(), &new);
        assert_eq!(ops(&plan), ["add /a~1b = 1", "add /c~0d = 2"]);
    }

    #[test]
    fn test_null_counts_as_absent() {
        let old = AttributeMap::new().with("name", "a");
        let new = AttributeMap::new().with("name", "a").with("description", AttrValue::Null);
        assert!(PatchDiffer::default().diff(&old, &new).is_empty());
    }

    #[test]
    fn test_repeat_is_byte_identical() {
        let old = AttributeMap::new().with("b", 1).with("a", vec![AttrValue::from(1.5)]);
        let new = AttributeMap::new().with("c", false).with("a", vec![AttrValue::from(2.5), AttrValue::Null]);
        let differ = PatchDiffer::default();
        assert_eq!(
            differ.diff(&old, &new).to_json().to_string(),
            differ.diff(&old, &new).to_json().to_string()
        );
    }
}
