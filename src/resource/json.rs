//! Data-driven resource kind over any [`Transport`].
//!
//! [`JsonResource`] maps the four lifecycle calls onto configured operation
//! and field names, decodes list records with a [`FieldDecoder`] and reports
//! [`LifecycleStatus`]. It is enough to drive the simulated remote and any
//! API that follows the same create/list/patch/delete shape.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::differ::UpdatePlan;
use crate::error::{EngineError, Phase, Result};
use crate::finder::{FieldDecoder, Finder, Pagination, Query};
use crate::identity::{IdentifierCodec, ResourceHandle};
use crate::model::{AttributeMap, LifecycleStatus, RemoteState};
use crate::remote::{RetryPolicy, SimulatedCloud, Transport};
use crate::waiter::{PollSchedule, WaitSpec};

use super::kind::ResourceKind;

/// Handle codec for top-level resources.
const TOP_LEVEL: IdentifierCodec = IdentifierCodec::new(IdentifierCodec::COMMA, &["ID"]);

/// Handle codec for resources nested under a parent.
const NESTED: IdentifierCodec = IdentifierCodec::new(IdentifierCodec::COMMA, &["PARENT-ID", "ID"]);

/// Parent scope of a nested resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentScope {
    /// Request parameter carrying the parent identifier.
    pub param: String,
    /// Parent identifier.
    pub id: String,
}

/// Operation and field names of a [`JsonResource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResourceConfig {
    /// Kind name used in logs and errors.
    pub kind: String,
    /// Create operation; takes `attributes_param`, returns `id_field`.
    pub create_operation: String,
    /// List operation; takes `id_param`, returns paginated records.
    pub list_operation: String,
    /// Update operation; takes `id_param` and `patch_param`.
    pub update_operation: String,
    /// Delete operation; takes `id_param`.
    pub delete_operation: String,
    /// Request parameter carrying the resource identifier.
    pub id_param: String,
    /// Request parameter carrying the desired attributes on create.
    pub attributes_param: String,
    /// Request parameter carrying the patch document on update.
    pub patch_param: String,
    /// Parent scope, for nested resources.
    pub parent: Option<ParentScope>,
    /// How list records are decoded.
    pub decoder: FieldDecoder,
    /// Where pagination tokens live.
    pub pagination: Pagination,
    /// Extra statuses that count as pending while an update settles.
    pub update_pending_extra: Vec<LifecycleStatus>,
    /// Timeout for the create-wait.
    pub create_timeout: Duration,
    /// Timeout for the update-wait.
    pub update_timeout: Duration,
    /// Timeout for the delete-wait.
    pub delete_timeout: Duration,
    /// Poll schedule for every wait.
    pub poll: PollSchedule,
    /// Not-found results tolerated right after create.
    pub not_found_checks: u32,
}

impl JsonResourceConfig {
    /// Configuration matching the operations of [`SimulatedCloud`].
    #[must_use]
    pub fn simulated(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            create_operation: String::from(SimulatedCloud::CREATE),
            list_operation: String::from(SimulatedCloud::LIST),
            update_operation: String::from(SimulatedCloud::UPDATE),
            delete_operation: String::from(SimulatedCloud::DELETE),
            id_param: String::from("id"),
            attributes_param: String::from("attributes"),
            patch_param: String::from("patch"),
            parent: None,
            decoder: FieldDecoder::default(),
            pagination: Pagination::default(),
            update_pending_extra: Vec::new(),
            create_timeout: Duration::from_secs(20 * 60),
            update_timeout: Duration::from_secs(20 * 60),
            delete_timeout: Duration::from_secs(20 * 60),
            poll: PollSchedule::Fixed(Duration::from_secs(10)),
            not_found_checks: 0,
        }
    }

    /// Nests the resource under a parent.
    #[must_use]
    pub fn with_parent(mut self, param: impl Into<String>, id: impl Into<String>) -> Self {
        self.parent = Some(ParentScope {
            param: param.into(),
            id: id.into(),
        });
        self
    }

    /// Whitelists extra statuses as pending after an update.
    #[must_use]
    pub fn with_update_pending(mut self, statuses: impl IntoIterator<Item = LifecycleStatus>) -> Self {
        self.update_pending_extra.extend(statuses);
        self
    }

    /// Sets the poll schedule of every wait.
    #[must_use]
    pub const fn with_poll(mut self, poll: PollSchedule) -> Self {
        self.poll = poll;
        self
    }
}

/// Data-driven [`ResourceKind`].
pub struct JsonResource {
    config: JsonResourceConfig,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    finder: Finder<LifecycleStatus>,
}

impl JsonResource {
    /// Creates a resource kind over `transport`.
    #[must_use]
    pub fn new(config: JsonResourceConfig, transport: Arc<dyn Transport>) -> Self {
        let retry = RetryPolicy::default();
        let finder = Self::build_finder(&config, Arc::clone(&transport), retry);
        Self {
            config,
            transport,
            retry,
            finder,
        }
    }

    /// Sets the retry policy for every call.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self.finder = Self::build_finder(&self.config, Arc::clone(&self.transport), retry);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &JsonResourceConfig {
        &self.config
    }

    fn build_finder(config: &JsonResourceConfig, transport: Arc<dyn Transport>, retry: RetryPolicy) -> Finder<LifecycleStatus> {
        Finder::new(transport, Arc::new(config.decoder.clone()))
            .with_retry(retry)
            .with_pagination(config.pagination.clone())
            .with_gone_statuses([LifecycleStatus::Deleted])
    }

    fn codec(&self) -> IdentifierCodec {
        if self.config.parent.is_some() { NESTED } else { TOP_LEVEL }
    }

    fn encode_handle(&self, id: &str) -> Result<ResourceHandle> {
        match &self.config.parent {
            Some(parent) => NESTED.encode(&[parent.id.as_str(), id]),
            None => TOP_LEVEL.encode(&[id]),
        }
    }

    /// Splits a handle into the parent scope (if nested) and the identifier.
    fn decode_handle(&self, handle: &ResourceHandle) -> Result<(Option<String>, String)> {
        let mut parts = self.codec().decode(handle)?;
        let id = parts.pop().ok_or_else(|| EngineError::internal("codec returned no parts"))?;
        Ok((parts.pop(), id))
    }

    fn scoped_params(&self, parent_id: Option<String>) -> Map<String, Value> {
        let mut params = Map::new();
        if let (Some(scope), Some(parent_id)) = (&self.config.parent, parent_id) {
            params.insert(scope.param.clone(), Value::String(parent_id));
        }
        params
    }

    fn target(&self, handle: &ResourceHandle) -> String {
        format!("{} {handle}", self.config.kind)
    }

    async fn call(&self, operation: &str, params: Map<String, Value>, target: &str) -> Result<Value> {
        self.retry
            .invoke(self.transport.as_ref(), operation, &Value::Object(params), target)
            .await
    }
}

#[async_trait]
impl ResourceKind for JsonResource {
    type Status = LifecycleStatus;

    fn kind_name(&self) -> &str {
        &self.config.kind
    }

    async fn create(&self, desired: &AttributeMap) -> Result<ResourceHandle> {
        let parent_id = self.config.parent.as_ref().map(|p| p.id.clone());
        let mut params = self.scoped_params(parent_id);
        params.insert(self.config.attributes_param.clone(), desired.to_json());

        let target = format!("new {}", self.config.kind);
        let response = self.call(&self.config.create_operation, params, &target).await?;

        let id_field = &self.config.decoder.id_field;
        let id = response.get(id_field).and_then(Value::as_str).ok_or_else(|| {
            EngineError::invalid_response(format!(
                "{} response has no string field {id_field}",
                self.config.create_operation
            ))
        })?;
        debug!("Created {} {id}", self.config.kind);
        self.encode_handle(id)
    }

    async fn find(&self, handle: &ResourceHandle) -> Result<RemoteState<LifecycleStatus>> {
        let (parent_id, id) = self.decode_handle(handle)?;
        let mut query = Query::new(self.config.list_operation.clone(), self.target(handle))
            .param(self.config.id_param.clone(), id.clone());
        for (name, value) in self.scoped_params(parent_id) {
            query = query.param(name, value);
        }
        self.finder.find_by_id(&query, &id).await
    }

    async fn apply(&self, handle: &ResourceHandle, plan: &UpdatePlan) -> Result<()> {
        let (parent_id, id) = self.decode_handle(handle)?;
        let mut params = self.scoped_params(parent_id);
        params.insert(self.config.id_param.clone(), Value::String(id));
        params.insert(self.config.patch_param.clone(), plan.to_json());

        self.call(&self.config.update_operation, params, &self.target(handle)).await?;
        Ok(())
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<()> {
        let (parent_id, id) = self.decode_handle(handle)?;
        let mut params = self.scoped_params(parent_id);
        params.insert(self.config.id_param.clone(), Value::String(id));

        self.call(&self.config.delete_operation, params, &self.target(handle)).await?;
        Ok(())
    }

    fn wait_spec(&self, phase: Phase) -> WaitSpec<LifecycleStatus> {
        let config = &self.config;
        match phase {
            Phase::Create => WaitSpec::new(config.create_timeout)
                .pending([LifecycleStatus::Creating])
                .target([LifecycleStatus::Available])
                .failure([LifecycleStatus::Failed])
                .not_found_checks(config.not_found_checks)
                .poll_schedule(config.poll),
            Phase::Update => WaitSpec::new(config.update_timeout)
                .pending([LifecycleStatus::Updating])
                .pending(config.update_pending_extra.iter().copied())
                .target([LifecycleStatus::Available])
                .failure([LifecycleStatus::Failed])
                .poll_schedule(config.poll),
            Phase::Delete => WaitSpec::new(config.delete_timeout)
                .pending([LifecycleStatus::Deleting])
                .failure([LifecycleStatus::Failed])
                .target_not_found()
                .poll_schedule(config.poll),
            Phase::Read => WaitSpec::new(Duration::ZERO).target(LifecycleStatus::ALL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::remote::{MockTransport, SimulationScript};
    use mockall::predicate::eq;
    use serde_json::json;

    fn simulated(config: JsonResourceConfig) -> (Arc<SimulatedCloud>, JsonResource) {
        let cloud = Arc::new(SimulatedCloud::new(SimulationScript::default()));
        let kind = JsonResource::new(config, cloud.clone());
        (cloud, kind)
    }

    #[tokio::test]
    async fn test_create_find_delete() {
        let (cloud, kind) = simulated(JsonResourceConfig::simulated("widget"));
        let handle = kind.create(&AttributeMap::new().with("name", "a")).await.unwrap();
        assert!(handle.as_str().starts_with("res-"));

        let state = kind.find(&handle).await.unwrap();
        assert_eq!(state.id(), handle.as_str());
        assert_eq!(*state.status(), LifecycleStatus::Creating);

        kind.delete(&handle).await.unwrap();
        assert_eq!(cloud.calls(SimulatedCloud::DELETE), 1);
    }

    #[tokio::test]
    async fn test_nested_handle_carries_parent() {
        let config = JsonResourceConfig::simulated("stage").with_parent("restApiId", "abc123");
        let (_cloud, kind) = simulated(config);
        let handle = kind.create(&AttributeMap::new()).await.unwrap();
        assert!(handle.as_str().starts_with("abc123,res-"));
        assert!(kind.find(&handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_malformed_handle_is_rejected_before_any_call() {
        let mut transport = MockTransport::new();
        transport.expect_invoke().never();
        let kind = JsonResource::new(
            JsonResourceConfig::simulated("stage").with_parent("restApiId", "abc123"),
            Arc::new(transport),
        );

        let err = kind.find(&ResourceHandle::from_raw("only-one-part")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedHandle);
    }

    #[tokio::test]
    async fn test_apply_sends_rendered_patch() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .with(
                eq(SimulatedCloud::UPDATE),
                eq(json!({"id": "w-1", "patch": [{"op": "replace", "path": "/size", "value": "2"}]})),
            )
            .times(1)
            .returning(|_, _| Ok(Value::Null));

        let kind = JsonResource::new(JsonResourceConfig::simulated("widget"), Arc::new(transport));
        let plan = kind.diff(
            &AttributeMap::new().with("size", 1),
            &AttributeMap::new().with("size", 2),
        );
        kind.apply(&ResourceHandle::from_raw("w-1"), &plan).await.unwrap();
    }

    #[test]
    fn test_update_wait_whitelists_quirk_statuses() {
        let mut transport = MockTransport::new();
        transport.expect_invoke().never();
        let kind = JsonResource::new(
            JsonResourceConfig::simulated("stage").with_update_pending([LifecycleStatus::Deleting]),
            Arc::new(transport),
        );

        let spec = kind.wait_spec(Phase::Update);
        assert!(spec.is_pending(&LifecycleStatus::Deleting));
        assert!(!kind.wait_spec(Phase::Create).is_pending(&LifecycleStatus::Deleting));
        assert!(kind.wait_spec(Phase::Delete).accepts_not_found());
    }
}
