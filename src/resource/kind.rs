//! The per-kind collaborator trait.

use async_trait::async_trait;

use crate::differ::{PatchDiffer, UpdatePlan};
use crate::error::{Phase, Result};
use crate::identity::ResourceHandle;
use crate::model::{AttributeMap, RemoteState, ResourceStatus};
use crate::waiter::WaitSpec;

/// Everything the reconcile controller needs to know about one resource kind.
///
/// Implementations own the request shapes, the identifier codec and the
/// status sets of their kind; the controller owns phase ordering.
#[async_trait]
pub trait ResourceKind: Send + Sync {
    /// Status enumeration of the kind.
    type Status: ResourceStatus;

    /// Human-readable kind name, e.g. `widget`.
    fn kind_name(&self) -> &str;

    /// Issues the create call and returns the new handle.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the create call fails.
    async fn create(&self, desired: &AttributeMap) -> Result<ResourceHandle>;

    /// Looks the resource up by handle.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the resource does not exist, `MalformedHandle`
    /// if the handle cannot be decoded.
    async fn find(&self, handle: &ResourceHandle) -> Result<RemoteState<Self::Status>>;

    /// Computes the update plan from the last applied configuration.
    fn diff(&self, applied: &AttributeMap, desired: &AttributeMap) -> UpdatePlan {
        PatchDiffer::default().diff(applied, desired)
    }

    /// Sends an update plan.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the update call fails.
    async fn apply(&self, handle: &ResourceHandle, plan: &UpdatePlan) -> Result<()>;

    /// Issues the delete call.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the delete call fails, including
    /// `NotFound`; the controller decides whether that is success.
    async fn delete(&self, handle: &ResourceHandle) -> Result<()>;

    /// Wait spec for the end of a phase. `Phase::Read` never waits.
    fn wait_spec(&self, phase: Phase) -> WaitSpec<Self::Status>;
}
