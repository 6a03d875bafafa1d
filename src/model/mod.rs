//! Data model shared by every engine component.
//!
//! - Attribute maps for desired and observed configuration
//! - Immutable remote state snapshots and status bounds
//! - The generic lifecycle status enumeration
//! - Configuration fingerprints for change detection

mod attributes;
mod fingerprint;
mod state;
mod status;

pub use attributes::{AttrValue, AttributeMap, format_float};
pub use fingerprint::Fingerprinter;
pub use state::{RemoteState, ResourceStatus, StateSnapshot};
pub use status::{LifecycleStatus, UnknownStatus};
