//! Remote state snapshots.
//!
//! A [`RemoteState`] is an immutable snapshot of one remote resource, taken by
//! a finder. Every poll produces a fresh snapshot; nothing mutates one after
//! it is built.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use super::attributes::AttributeMap;

/// Bound for per-resource-type status enumerations.
///
/// Every resource kind declares a closed set of statuses; waiters compare
/// observed statuses against sets of them.
pub trait ResourceStatus: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

impl<T> ResourceStatus for T where T: Clone + Eq + Hash + Debug + Display + Send + Sync + 'static {}

/// Immutable snapshot of a remote resource.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState<S> {
    id: String,
    status: S,
    status_reason: Option<String>,
    attributes: AttributeMap,
    observed_at: DateTime<Utc>,
}

/// Type-erased copy of a [`RemoteState`], attached to errors for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    /// Identifier the remote reported for itself.
    pub id: String,
    /// Status rendered as a string.
    pub status: String,
    /// Status reason reported by the remote, if any.
    pub status_reason: Option<String>,
    /// Observed attributes.
    pub attributes: AttributeMap,
    /// When the snapshot was taken.
    pub observed_at: DateTime<Utc>,
}

impl<S: ResourceStatus> RemoteState<S> {
    /// Creates a snapshot observed now.
    #[must_use]
    pub fn new(id: impl Into<String>, status: S, attributes: AttributeMap) -> Self {
        Self {
            id: id.into(),
            status,
            status_reason: None,
            attributes,
            observed_at: Utc::now(),
        }
    }

    /// Attaches the remote's explanation for the current status.
    #[must_use]
    pub fn with_status_reason(mut self, reason: impl Into<String>) -> Self {
        self.status_reason = Some(reason.into());
        self
    }

    /// Identifier the remote reported for this object.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> &S {
        &self.status
    }

    /// Status reason, if the remote reported one.
    #[must_use]
    pub fn status_reason(&self) -> Option<&str> {
        self.status_reason.as_deref()
    }

    /// Observed attributes.
    #[must_use]
    pub const fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    /// When the snapshot was taken.
    #[must_use]
    pub const fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    /// Builds the type-erased snapshot carried by errors.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            id: self.id.clone(),
            status: self.status.to_string(),
            status_reason: self.status_reason.clone(),
            attributes: self.attributes.clone(),
            observed_at: self.observed_at,
        }
    }
}

impl std::fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.id, self.status)?;
        if let Some(reason) = &self.status_reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}
