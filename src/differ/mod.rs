//! Differs: minimal remote update operations from an (old, new) pair.
//!
//! - [`PatchDiffer`]: JSON-Patch style `add`/`replace`/`remove` plans
//! - [`TagPolicy::diff`] and [`diff_tags`]: tag add/remove sets
//! - [`diff_attribute_updates`]: per-attribute `PUT`/`DELETE` updates
//!
//! Every differ is a pure function of its inputs and emits operations in
//! sorted key order.

mod patch;
mod plan;
mod tags;
mod updates;

pub use patch::PatchDiffer;
pub use plan::{PatchOp, PatchVerb, UpdatePlan, WireOp, escape_segment, unescape_segment};
pub use tags::{TagDiff, TagPolicy, Tags, diff_tags};
pub use updates::{AttributeUpdate, UpdateAction, diff_attribute_updates};
