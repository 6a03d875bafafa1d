//! Reconcile controller.
//!
//! One [`ReconcileController`] drives one resource instance through its
//! phases in strict order:
//!
//! ```text
//! create -> wait(created) -> read
//!        -> [changed desired config: diff -> apply -> wait(updated)] -> read
//!        -> delete -> wait(gone)
//! ```
//!
//! Every error leaving the controller names the phase and the handle. The
//! controller owns no shared state; run as many as needed concurrently, one
//! per resource.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::differ::UpdatePlan;
use crate::error::{EngineError, Phase, Result};
use crate::identity::ResourceHandle;
use crate::model::{AttributeMap, Fingerprinter, RemoteState, ResourceStatus};
use crate::resource::ResourceKind;
use crate::waiter::{PollSchedule, WaitOutcome, WaitSpec, wait_for};

/// Handle shown in errors raised before the create call returned one.
const PENDING_HANDLE: &str = "<pending>";

/// User overrides of per-kind wait specs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WaitOverrides {
    /// Timeout for the create-wait.
    pub create_timeout: Option<Duration>,
    /// Timeout for the update-wait.
    pub update_timeout: Option<Duration>,
    /// Timeout for the delete-wait.
    pub delete_timeout: Option<Duration>,
    /// Poll schedule for every wait.
    pub poll: Option<PollSchedule>,
}

impl WaitOverrides {
    /// Applies the overrides relevant to `phase`.
    #[must_use]
    pub fn apply<S: ResourceStatus>(&self, phase: Phase, spec: WaitSpec<S>) -> WaitSpec<S> {
        let timeout = match phase {
            Phase::Create => self.create_timeout,
            Phase::Update => self.update_timeout,
            Phase::Delete => self.delete_timeout,
            Phase::Read => None,
        };
        let spec = match timeout {
            Some(timeout) => spec.with_timeout(timeout),
            None => spec,
        };
        match self.poll {
            Some(poll) => spec.poll_schedule(poll),
            None => spec,
        }
    }
}

/// What a reconcile pass did.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The resource was created.
    Created,
    /// The resource was updated with this plan.
    Updated(UpdatePlan),
    /// The desired configuration had not changed.
    Unchanged,
}

/// Number of phase records a controller keeps by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// One entry of a controller's phase history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRecord {
    /// Phase that ran.
    pub phase: Phase,
    /// Handle at the end of the phase, if any.
    pub handle: Option<String>,
    /// When the phase started.
    pub started_at: DateTime<Utc>,
    /// When the phase ended.
    pub finished_at: DateTime<Utc>,
    /// Whether the phase succeeded.
    pub succeeded: bool,
    /// Outcome summary or error message.
    pub detail: String,
}

#[derive(Debug, Clone)]
struct AppliedConfig {
    attributes: AttributeMap,
    fingerprint: String,
}

/// Drives one resource instance through its lifecycle.
pub struct ReconcileController<K: ResourceKind> {
    kind: Arc<K>,
    overrides: WaitOverrides,
    cancel: CancellationToken,
    fingerprinter: Fingerprinter,
    handle: Option<ResourceHandle>,
    applied: Option<AppliedConfig>,
    observed: Option<RemoteState<K::Status>>,
    history: VecDeque<PhaseRecord>,
    history_limit: usize,
}

impl<K: ResourceKind> ReconcileController<K> {
    /// Creates a controller for a resource that does not exist yet.
    #[must_use]
    pub fn new(kind: Arc<K>) -> Self {
        Self {
            kind,
            overrides: WaitOverrides::default(),
            cancel: CancellationToken::new(),
            fingerprinter: Fingerprinter::new(),
            handle: None,
            applied: None,
            observed: None,
            history: VecDeque::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Sets wait overrides.
    #[must_use]
    pub const fn with_overrides(mut self, overrides: WaitOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Keeps at most `limit` phase records; older ones are dropped first.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        let excess = self.history.len().saturating_sub(self.history_limit);
        self.history.drain(..excess);
        self
    }

    /// Sets the token that cancels waits.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current handle; `None` before create and after delete.
    #[must_use]
    pub const fn handle(&self) -> Option<&ResourceHandle> {
        self.handle.as_ref()
    }

    /// Last observed state.
    #[must_use]
    pub const fn observed(&self) -> Option<&RemoteState<K::Status>> {
        self.observed.as_ref()
    }

    /// Fingerprint of the last applied desired configuration.
    #[must_use]
    pub fn applied_fingerprint(&self) -> Option<&str> {
        self.applied.as_ref().map(|a| a.fingerprint.as_str())
    }

    /// Recent phase history, oldest first.
    #[must_use]
    pub const fn history(&self) -> &VecDeque<PhaseRecord> {
        &self.history
    }

    /// Takes over an existing resource by handle and reads it.
    ///
    /// Until the first update, the baseline for diffs is the observed
    /// configuration restricted to the desired keys.
    ///
    /// # Errors
    ///
    /// Returns a `read` phase error if the resource cannot be found; the
    /// controller is left without a handle.
    pub async fn adopt(&mut self, handle: ResourceHandle) -> Result<&RemoteState<K::Status>> {
        info!("Adopting {} {handle}", self.kind.kind_name());
        self.handle = Some(handle);
        self.applied = None;
        if let Err(err) = self.refresh().await {
            self.handle = None;
            return Err(err);
        }
        self.current()
    }

    /// Create, wait until created, read.
    ///
    /// # Errors
    ///
    /// Returns a `create` phase error if the call or the wait fails (the
    /// handle is kept when the call succeeded, so the resource can still be
    /// deleted), or a `read` phase error if the created resource cannot be
    /// read back.
    pub async fn create(&mut self, desired: &AttributeMap) -> Result<&RemoteState<K::Status>> {
        let started = Utc::now();
        if let Some(handle) = &self.handle {
            return Err(EngineError::internal(format!("{} already exists", self.kind.kind_name()))
                .in_phase(Phase::Create, handle.as_str()));
        }

        info!("Creating {}", self.kind.kind_name());
        let handle = match self.kind.create(desired).await {
            Ok(handle) => handle,
            Err(err) => return Err(self.fail(Phase::Create, started, err)),
        };
        self.handle = Some(handle.clone());

        if let Err(err) = self.wait(Phase::Create, &handle).await {
            return Err(self.fail(Phase::Create, started, err));
        }

        self.remember_applied(desired);
        self.succeed(Phase::Create, started, format!("created {handle}"));
        self.refresh().await?;
        self.current()
    }

    /// Reads the current remote state.
    ///
    /// # Errors
    ///
    /// Returns a `read` phase error, including `NotFound`.
    pub async fn read(&mut self) -> Result<&RemoteState<K::Status>> {
        self.refresh().await?;
        self.current()
    }

    /// Applies `desired` if it changed since it was last applied, then reads.
    ///
    /// # Errors
    ///
    /// Returns an `update` phase error if the apply call or the wait fails,
    /// or a `read` phase error from the final read.
    pub async fn update(&mut self, desired: &AttributeMap) -> Result<ReconcileOutcome> {
        let started = Utc::now();
        let handle = self.require_handle(Phase::Update)?;

        let fingerprint = self.fingerprinter.fingerprint(desired);
        if self
            .applied
            .as_ref()
            .is_some_and(|a| Fingerprinter::matches(&a.fingerprint, &fingerprint))
        {
            info!("{} {handle} is unchanged", self.kind.kind_name());
            self.refresh().await?;
            return Ok(ReconcileOutcome::Unchanged);
        }

        let baseline = self.baseline(desired);
        let plan = self.kind.diff(&baseline, desired);
        if plan.is_empty() {
            self.remember_applied(desired);
            self.succeed(Phase::Update, started, String::from("no changes"));
            self.refresh().await?;
            return Ok(ReconcileOutcome::Unchanged);
        }

        info!("Updating {} {handle} with {} operation(s)", self.kind.kind_name(), plan.len());
        if let Err(err) = self.kind.apply(&handle, &plan).await {
            return Err(self.fail(Phase::Update, started, err));
        }
        if let Err(err) = self.wait(Phase::Update, &handle).await {
            return Err(self.fail(Phase::Update, started, err));
        }

        self.remember_applied(desired);
        self.succeed(Phase::Update, started, format!("applied {} operation(s)", plan.len()));
        self.refresh().await?;
        Ok(ReconcileOutcome::Updated(plan))
    }

    /// Delete, wait until gone, invalidate the handle.
    ///
    /// A resource that is already gone, at the delete call or during the
    /// wait, counts as deleted. Without a handle this does nothing.
    ///
    /// # Errors
    ///
    /// Returns a `delete` phase error for any other failure; the handle is
    /// kept so the delete can be retried.
    pub async fn delete(&mut self) -> Result<()> {
        let started = Utc::now();
        let Some(handle) = self.handle.clone() else {
            return Ok(());
        };

        info!("Deleting {} {handle}", self.kind.kind_name());
        match self.kind.delete(&handle).await {
            Ok(()) => match self.wait(Phase::Delete, &handle).await {
                Ok(_) => {}
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(self.fail(Phase::Delete, started, err)),
            },
            Err(err) if err.is_not_found() => {
                warn!("{} {handle} was already gone", self.kind.kind_name());
            }
            Err(err) => return Err(self.fail(Phase::Delete, started, err)),
        }

        self.succeed(Phase::Delete, started, format!("deleted {handle}"));
        self.handle = None;
        self.applied = None;
        self.observed = None;
        Ok(())
    }

    /// Creates the resource if it has no handle, otherwise updates it.
    ///
    /// # Errors
    ///
    /// Everything [`ReconcileController::create`] and
    /// [`ReconcileController::update`] return.
    pub async fn reconcile(&mut self, desired: &AttributeMap) -> Result<ReconcileOutcome> {
        if self.handle.is_none() {
            self.create(desired).await?;
            return Ok(ReconcileOutcome::Created);
        }
        self.update(desired).await
    }

    async fn refresh(&mut self) -> Result<()> {
        let started = Utc::now();
        let handle = self.require_handle(Phase::Read)?;
        match self.kind.find(&handle).await {
            Ok(state) => {
                self.observed = Some(state);
                self.succeed(Phase::Read, started, String::from("read"));
                Ok(())
            }
            Err(err) => Err(self.fail(Phase::Read, started, err)),
        }
    }

    async fn wait(&self, phase: Phase, handle: &ResourceHandle) -> Result<WaitOutcome<K::Status>> {
        let spec = self.overrides.apply(phase, self.kind.wait_spec(phase));
        let target = format!("{} {handle}", self.kind.kind_name());
        let kind = &self.kind;
        wait_for(&target, &spec, &self.cancel, || kind.find(handle)).await
    }

    fn current(&self) -> Result<&RemoteState<K::Status>> {
        self.observed
            .as_ref()
            .ok_or_else(|| EngineError::internal("no observed state after read"))
    }

    fn require_handle(&self, phase: Phase) -> Result<ResourceHandle> {
        self.handle.clone().ok_or_else(|| {
            EngineError::internal(format!("{} has not been created", self.kind.kind_name()))
                .in_phase(phase, PENDING_HANDLE)
        })
    }

    /// Diff baseline: the last applied config, or the observed one for adopted resources.
    fn baseline(&self, desired: &AttributeMap) -> AttributeMap {
        match (&self.applied, &self.observed) {
            (Some(applied), _) => applied.attributes.clone(),
            (None, Some(observed)) => observed.attributes().project(desired.keys().map(String::as_str)),
            (None, None) => AttributeMap::new(),
        }
    }

    fn remember_applied(&mut self, desired: &AttributeMap) {
        self.applied = Some(AppliedConfig {
            attributes: desired.clone(),
            fingerprint: self.fingerprinter.fingerprint(desired),
        });
    }

    fn record(&mut self, record: PhaseRecord) {
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    fn succeed(&mut self, phase: Phase, started_at: DateTime<Utc>, detail: String) {
        let record = PhaseRecord {
            phase,
            handle: self.handle.as_ref().map(ToString::to_string),
            started_at,
            finished_at: Utc::now(),
            succeeded: true,
            detail,
        };
        self.record(record);
    }

    fn fail(&mut self, phase: Phase, started_at: DateTime<Utc>, err: EngineError) -> EngineError {
        let handle = self
            .handle
            .as_ref()
            .map_or_else(|| String::from(PENDING_HANDLE), ToString::to_string);
        let err = err.in_phase(phase, handle);
        error!("{err}");
        let record = PhaseRecord {
            phase,
            handle: self.handle.as_ref().map(ToString::to_string),
            started_at,
            finished_at: Utc::now(),
            succeeded: false,
            detail: err.to_string(),
        };
        self.record(record);
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{AttrValue, LifecycleStatus};
    use crate::remote::{SimulatedCloud, SimulationScript, TransportError};
    use crate::resource::{JsonResource, JsonResourceConfig};

    fn controller(script: SimulationScript) -> (Arc<SimulatedCloud>, ReconcileController<JsonResource>) {
        let cloud = Arc::new(SimulatedCloud::new(script));
        let kind = JsonResource::new(JsonResourceConfig::simulated("widget"), cloud.clone());
        (cloud, ReconcileController::new(Arc::new(kind)))
    }

    fn desired(size: i64) -> AttributeMap {
        AttributeMap::new().with("name", "a").with("size", size)
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_then_reads() {
        let (cloud, mut controller) = controller(SimulationScript::default());
        let state = controller.create(&desired(1)).await.unwrap();

        assert_eq!(*state.status(), LifecycleStatus::Available);
        assert_eq!(state.attributes().get("size"), Some(&AttrValue::Int(1)));
        // Two wait polls (CREATING, AVAILABLE) and the read.
        assert_eq!(cloud.calls(SimulatedCloud::LIST), 3);
        assert!(controller.applied_fingerprint().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_desired_config_skips_apply() {
        let (cloud, mut controller) = controller(SimulationScript::default());
        controller.create(&desired(1)).await.unwrap();

        let outcome = controller.update(&desired(1)).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(cloud.calls(SimulatedCloud::UPDATE), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_without_handle_names_phase() {
        let (_cloud, mut controller) = controller(SimulationScript::default());
        let err = controller.update(&desired(1)).await.unwrap_err();
        assert_eq!(err.phase(), Some(Phase::Update));
        assert_eq!(err.handle(), Some(PENDING_HANDLE));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_failure_keeps_handle() {
        let (_cloud, mut controller) = controller(SimulationScript {
            create_settles: LifecycleStatus::Failed,
            create_reason: Some(String::from("quota exceeded")),
            ..SimulationScript::default()
        });

        let err = controller.create(&desired(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Failure);
        assert_eq!(err.phase(), Some(Phase::Create));
        assert!(controller.handle().is_some());
        assert_eq!(
            err.last_observed().and_then(|s| s.status_reason.as_deref()),
            Some("quota exceeded")
        );

        let last = controller.history().back().unwrap();
        assert!(!last.succeeded);
        assert_eq!(last.phase, Phase::Create);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_of_vanished_resource_succeeds() {
        let (cloud, mut controller) = controller(SimulationScript::default());
        controller.create(&desired(1)).await.unwrap();
        cloud.script_response(
            SimulatedCloud::DELETE,
            Err(TransportError::NotFound {
                code: String::from("ResourceNotFoundException"),
                message: String::from("gone"),
            }),
        );

        controller.delete().await.unwrap();
        assert!(controller.handle().is_none());
        assert!(controller.observed().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_wait_timeout_keeps_handle() {
        let (_cloud, mut controller) = controller(SimulationScript {
            delete: vec![LifecycleStatus::Deleting; 100],
            ..SimulationScript::default()
        });
        controller.create(&desired(1)).await.unwrap();

        let mut controller = controller.with_overrides(WaitOverrides {
            delete_timeout: Some(Duration::from_secs(30)),
            ..WaitOverrides::default()
        });
        let err = controller.delete().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.phase(), Some(Phase::Delete));
        assert!(controller.handle().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopt_uses_observed_baseline() {
        let (cloud, mut controller) = controller(SimulationScript::default());
        let id = cloud.seed(
            "res-existing",
            LifecycleStatus::Available,
            AttributeMap::new().with("name", "a").with("size", 1).with("arn", "computed"),
        );

        controller.adopt(ResourceHandle::from_raw(id)).await.unwrap();
        let outcome = controller.update(&desired(2)).await.unwrap();

        let ReconcileOutcome::Updated(plan) = outcome else {
            panic!("expected an update, got {outcome:?}");
        };
        // The computed "arn" attribute is not removed.
        assert_eq!(plan.to_json().to_string(), r#"[{"op":"replace","path":"/size","value":"2"}]"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_adopt_missing_resource() {
        let (_cloud, mut controller) = controller(SimulationScript::default());
        let err = controller.adopt(ResourceHandle::from_raw("res-missing")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.phase(), Some(Phase::Read));
        assert!(controller.handle().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait() {
        let cancel = CancellationToken::new();
        let (_cloud, controller) = controller(SimulationScript {
            create: vec![LifecycleStatus::Creating; 100],
            ..SimulationScript::default()
        });
        let mut controller = controller.with_cancellation(cancel.clone());
        cancel.cancel();

        let err = controller.create(&desired(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.phase(), Some(Phase::Create));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttling_during_create_wait_keeps_waiting() {
        let (cloud, mut controller) = controller(SimulationScript::default());
        for _ in 0..3 {
            cloud.script_response(
                SimulatedCloud::LIST,
                Err(TransportError::Throttled {
                    code: String::from("ThrottlingException"),
                    retry_after: None,
                }),
            );
        }

        let state = controller.create(&desired(1)).await.unwrap();
        assert_eq!(*state.status(), LifecycleStatus::Available);
        // One exhausted retry burst, two real wait polls and the read.
        assert_eq!(cloud.calls(SimulatedCloud::LIST), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_bounded() {
        let (_cloud, controller) = controller(SimulationScript::default());
        let mut controller = controller.with_history_limit(4);
        controller.create(&desired(1)).await.unwrap();
        for _ in 0..10 {
            assert_eq!(controller.reconcile(&desired(1)).await.unwrap(), ReconcileOutcome::Unchanged);
        }

        assert_eq!(controller.history().len(), 4);
        assert!(controller.history().iter().all(|r| r.phase == Phase::Read));
    }
}
