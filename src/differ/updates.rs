//! Attribute-value update differ.
//!
//! Some APIs update attributes one key at a time with a `PUT` or `DELETE`
//! action instead of a patch document.

use serde::Serialize;

use crate::model::{AttrValue, AttributeMap};

/// Action of an attribute update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateAction {
    /// Set the attribute to the given value.
    Put,
    /// Remove the attribute.
    Delete,
}

/// One attribute update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeUpdate {
    /// Attribute name.
    pub key: String,
    /// What to do.
    pub action: UpdateAction,
    /// New value for `Put`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<AttrValue>,
}

/// Computes per-attribute updates that turn `old` into `new`.
///
/// Top-level attributes only: a changed block is `Put` as a whole. Absent
/// values (nulls, empty blocks) are ignored on both sides.
#[must_use]
pub fn diff_attribute_updates(old: &AttributeMap, new: &AttributeMap) -> Vec<AttributeUpdate> {
    let old = old.normalized();
    let new = new.normalized();

    let mut keys: Vec<&String> = old.keys().chain(new.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter_map(|key| match (old.get(key), new.get(key)) {
            (Some(_), None) => Some(AttributeUpdate {
                key: key.clone(),
                action: UpdateAction::Delete,
                value: None,
            }),
            (before, Some(after)) if before != Some(after) => Some(AttributeUpdate {
                key: key.clone(),
                action: UpdateAction::Put,
                value: Some(after.clone()),
            }),
            _ => None,
        })
        .collect()
}
