//! Resource kinds: the per-kind half of a controller.

mod json;
mod kind;

pub use json::{JsonResource, JsonResourceConfig, ParentScope};
pub use kind::ResourceKind;
