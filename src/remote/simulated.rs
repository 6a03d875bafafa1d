//! In-memory simulated remote.
//!
//! [`SimulatedCloud`] implements [`Transport`] over a map of resources with
//! scripted status progressions. Every `List` observation advances the
//! status of each listed resource by one step, so a waiter polling it sees
//! the same `CREATING -> AVAILABLE` sequence a real API reports.
//!
//! Operations and their parameters:
//!
//! | Operation | Parameters | Response |
//! |-----------|------------|----------|
//! | `CreateResource` | `attributes` | `{"id", "status"}` |
//! | `ListResources` | `id?`, `NextToken?` | `{"Items": [...], "NextToken"?}` |
//! | `UpdateResource` | `id`, `patch` | `{"id", "status"}` |
//! | `DeleteResource` | `id` | `{"id", "status"}` |

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};
use uuid::Uuid;

use crate::differ::UpdatePlan;
use crate::model::{AttrValue, AttributeMap, LifecycleStatus};

use super::transport::{Transport, TransportError};

/// Error code the simulated remote uses for missing resources.
pub const NOT_FOUND_CODE: &str = "ResourceNotFoundException";

/// Status progressions the simulated remote plays back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationScript {
    /// Statuses reported after a create, before settling.
    pub create: Vec<LifecycleStatus>,
    /// Status a created resource settles in.
    pub create_settles: LifecycleStatus,
    /// Reason reported with the settled status, if any.
    pub create_reason: Option<String>,
    /// Statuses reported after an update, before settling back.
    pub update: Vec<LifecycleStatus>,
    /// Statuses reported after a delete, before disappearing.
    pub delete: Vec<LifecycleStatus>,
    /// Keep deleted resources listed with status `DELETED`.
    pub keep_deleted: bool,
    /// Maximum number of items per `List` page.
    pub page_size: usize,
}

impl Default for SimulationScript {
    fn default() -> Self {
        Self {
            create: vec![LifecycleStatus::Creating],
            create_settles: LifecycleStatus::Available,
            create_reason: None,
            update: vec![LifecycleStatus::Updating],
            delete: vec![LifecycleStatus::Deleting],
            keep_deleted: false,
            page_size: 50,
        }
    }
}

#[derive(Debug, Clone)]
struct SimResource {
    attributes: AttributeMap,
    pending: VecDeque<LifecycleStatus>,
    settled: Option<LifecycleStatus>,
    reason: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    resources: BTreeMap<String, SimResource>,
    scripted: HashMap<String, VecDeque<Result<Value, TransportError>>>,
    calls: HashMap<String, u32>,
}

/// In-memory remote with scripted status progressions.
#[derive(Debug, Default)]
pub struct SimulatedCloud {
    script: SimulationScript,
    inner: Mutex<Inner>,
}

impl SimResource {
    fn is_visible(&self) -> bool {
        !self.pending.is_empty() || self.settled.is_some()
    }

    fn current(&self) -> Option<LifecycleStatus> {
        self.pending.front().copied().or(self.settled)
    }

    fn accepts_changes(&self) -> bool {
        self.is_visible() && self.current() != Some(LifecycleStatus::Deleted)
    }

    fn observe(&mut self) -> Option<LifecycleStatus> {
        self.pending.pop_front().or(self.settled)
    }
}

impl SimulatedCloud {
    /// Operation that creates a resource.
    pub const CREATE: &'static str = "CreateResource";
    /// Operation that lists resources.
    pub const LIST: &'static str = "ListResources";
    /// Operation that patches a resource.
    pub const UPDATE: &'static str = "UpdateResource";
    /// Operation that deletes a resource.
    pub const DELETE: &'static str = "DeleteResource";

    /// Creates a simulated remote with the given script.
    #[must_use]
    pub fn new(script: SimulationScript) -> Self {
        Self {
            script,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Inserts an existing resource and returns its identifier.
    pub fn seed(&self, id: impl Into<String>, status: LifecycleStatus, attributes: AttributeMap) -> String {
        let id = id.into();
        self.lock().resources.insert(
            id.clone(),
            SimResource {
                attributes,
                pending: VecDeque::new(),
                settled: Some(status),
                reason: None,
            },
        );
        id
    }

    /// Makes the next call to `operation` return `response` instead of
    /// touching the simulated state. Queued responses are played in order.
    pub fn script_response(&self, operation: &str, response: Result<Value, TransportError>) {
        self.lock()
            .scripted
            .entry(operation.to_string())
            .or_default()
            .push_back(response);
    }

    /// Number of times `operation` was invoked.
    #[must_use]
    pub fn calls(&self, operation: &str) -> u32 {
        self.lock().calls.get(operation).copied().unwrap_or_default()
    }

    /// Current attributes of a resource, without advancing its status.
    #[must_use]
    pub fn attributes_of(&self, id: &str) -> Option<AttributeMap> {
        self.lock()
            .resources
            .get(id)
            .filter(|r| r.is_visible())
            .map(|r| r.attributes.clone())
    }

    /// Number of resources that are still listed.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.lock().resources.values().filter(|r| r.is_visible()).count()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn create(&self, inner: &mut Inner, params: &Value) -> Result<Value, TransportError> {
        let attributes = AttributeMap::from_json(&params["attributes"])
            .ok_or_else(|| validation("attributes must be an object"))?;

        let id = format!("res-{}", &Uuid::new_v4().simple().to_string()[..12]);
        let resource = SimResource {
            attributes,
            pending: self.script.create.iter().copied().collect(),
            settled: Some(self.script.create_settles),
            reason: self.script.create_reason.clone(),
        };
        let status = resource.current();
        inner.resources.insert(id.clone(), resource);

        info!("Simulated remote created {id}");
        Ok(json!({ "id": id, "status": status.map(LifecycleStatus::as_str) }))
    }

    fn list(&self, inner: &mut Inner, params: &Value) -> Result<Value, TransportError> {
        let start = match params.get("NextToken").and_then(Value::as_str) {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| validation(&format!("invalid NextToken {token}")))?,
            None => 0,
        };
        let id_filter = params.get("id").and_then(Value::as_str);

        let matching: Vec<String> = inner
            .resources
            .iter()
            .filter(|(id, r)| r.is_visible() && id_filter.is_none_or(|wanted| wanted == id.as_str()))
            .map(|(id, _)| id.clone())
            .collect();

        let page_size = self.script.page_size.max(1);
        let end = start.saturating_add(page_size).min(matching.len());

        let mut items = Vec::new();
        let mut finished = Vec::new();
        for id in matching.iter().take(end).skip(start) {
            let Some(resource) = inner.resources.get_mut(id) else {
                continue;
            };
            let observed = resource.observe();
            if !resource.is_visible() {
                finished.push(id.clone());
            }
            let Some(status) = observed else {
                continue;
            };
            let mut item = json!({
                "id": id,
                "status": status.as_str(),
                "attributes": resource.attributes.to_json(),
            });
            if let Some(reason) = &resource.reason {
                item["statusReason"] = json!(reason);
            }
            items.push(item);
        }
        for id in &finished {
            inner.resources.remove(id);
            debug!("Simulated remote dropped {id}");
        }

        debug!("Simulated remote listed {} item(s) from offset {start}", items.len());
        let mut response = json!({ "Items": items });
        if end < matching.len() {
            response["NextToken"] = json!(end.to_string());
        }
        Ok(response)
    }

    fn update(&self, inner: &mut Inner, params: &Value) -> Result<Value, TransportError> {
        let id = required_str(params, "id")?;
        let plan = UpdatePlan::from_wire("", &params["patch"]).map_err(|e| validation(&e.to_string()))?;

        let resource = inner
            .resources
            .get_mut(id)
            .filter(|r| r.accepts_changes())
            .ok_or_else(|| not_found(id))?;

        let patched = plan.apply_to(&resource.attributes).map_err(|e| validation(&e.to_string()))?;
        resource.attributes = coerce_like(&patched, &resource.attributes);
        resource.pending = self.script.update.iter().copied().collect();
        resource.settled = Some(LifecycleStatus::Available);

        info!("Simulated remote updated {id} ({} op(s))", plan.len());
        Ok(json!({ "id": id, "status": resource.current().map(LifecycleStatus::as_str) }))
    }

    fn delete(&self, inner: &mut Inner, params: &Value) -> Result<Value, TransportError> {
        let id = required_str(params, "id")?;
        let resource = inner
            .resources
            .get_mut(id)
            .filter(|r| r.accepts_changes())
            .ok_or_else(|| not_found(id))?;

        resource.pending = self.script.delete.iter().copied().collect();
        resource.settled = self.script.keep_deleted.then_some(LifecycleStatus::Deleted);
        let status = resource.current();
        if !resource.is_visible() {
            inner.resources.remove(id);
        }

        info!("Simulated remote deleting {id}");
        Ok(json!({ "id": id, "status": status.map(LifecycleStatus::as_str) }))
    }
}

#[async_trait]
impl Transport for SimulatedCloud {
    async fn invoke(&self, operation: &str, params: &Value) -> Result<Value, TransportError> {
        let mut inner = self.lock();
        *inner.calls.entry(operation.to_string()).or_default() += 1;

        if let Some(response) = inner.scripted.get_mut(operation).and_then(VecDeque::pop_front) {
            debug!("Simulated remote playing scripted response for {operation}");
            return response;
        }

        match operation {
            Self::CREATE => self.create(&mut inner, params),
            Self::LIST => self.list(&mut inner, params),
            Self::UPDATE => self.update(&mut inner, params),
            Self::DELETE => self.delete(&mut inner, params),
            other => Err(TransportError::Api {
                status: 400,
                code: String::from("UnknownOperationException"),
                message: format!("unknown operation {other}"),
            }),
        }
    }
}

fn required_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, TransportError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| validation(&format!("missing string parameter {field}")))
}

fn validation(message: &str) -> TransportError {
    TransportError::Api {
        status: 400,
        code: String::from("ValidationException"),
        message: message.to_string(),
    }
}

fn not_found(id: &str) -> TransportError {
    TransportError::NotFound {
        code: String::from(NOT_FOUND_CODE),
        message: format!("resource {id} does not exist"),
    }
}

/// Converts string values from a patch back to the type the attribute had.
fn coerce_like(patched: &AttributeMap, previous: &AttributeMap) -> AttributeMap {
    patched
        .iter()
        .map(|(key, value)| {
            let coerced = match (value, previous.get(key)) {
                (AttrValue::String(raw), Some(AttrValue::Int(_))) => {
                    raw.parse().map_or_else(|_| value.clone(), AttrValue::Int)
                }
                (AttrValue::String(raw), Some(AttrValue::Float(_))) => {
                    raw.parse().map_or_else(|_| value.clone(), AttrValue::Float)
                }
                (AttrValue::String(raw), Some(AttrValue::Bool(_))) => {
                    raw.parse().map_or_else(|_| value.clone(), AttrValue::Bool)
                }
                (AttrValue::Block(block), Some(AttrValue::Block(before))) => {
                    AttrValue::Block(coerce_like(block, before))
                }
                _ => value.clone(),
            };
            (key.clone(), coerced)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statuses(response: &Value) -> Vec<String> {
        response["Items"]
            .as_array()
            .map(|items| items.iter().map(|i| i["status"].as_str().unwrap_or_default().to_string()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_create_then_list_progresses() {
        let cloud = SimulatedCloud::new(SimulationScript::default());
        let created = cloud
            .invoke(SimulatedCloud::CREATE, &json!({"attributes": {"name": "a", "size": 1}}))
            .await
            .unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["status"], "CREATING");

        let query = json!({"id": id});
        let first = cloud.invoke(SimulatedCloud::LIST, &query).await.unwrap();
        let second = cloud.invoke(SimulatedCloud::LIST, &query).await.unwrap();
        assert_eq!(statuses(&first), ["CREATING"]);
        assert_eq!(statuses(&second), ["AVAILABLE"]);
        assert_eq!(second["Items"][0]["attributes"]["size"], 1);
    }

    #[tokio::test]
    async fn test_update_coerces_rendered_values() {
        let cloud = SimulatedCloud::new(SimulationScript::default());
        let id = cloud.seed("r-1", LifecycleStatus::Available, AttributeMap::new().with("size", 1));

        cloud
            .invoke(
                SimulatedCloud::UPDATE,
                &json!({"id": id, "patch": [{"op": "replace", "path": "/size", "value": "2"}]}),
            )
            .await
            .unwrap();
        assert_eq!(cloud.attributes_of(&id).unwrap().get("size"), Some(&AttrValue::Int(2)));
    }

    #[tokio::test]
    async fn test_delete_then_gone() {
        let cloud = SimulatedCloud::new(SimulationScript::default());
        let id = cloud.seed("r-1", LifecycleStatus::Available, AttributeMap::new());

        cloud.invoke(SimulatedCloud::DELETE, &json!({"id": id})).await.unwrap();
        let query = json!({"id": id});
        assert_eq!(statuses(&cloud.invoke(SimulatedCloud::LIST, &query).await.unwrap()), ["DELETING"]);
        assert!(statuses(&cloud.invoke(SimulatedCloud::LIST, &query).await.unwrap()).is_empty());

        let err = cloud.invoke(SimulatedCloud::DELETE, &query).await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound { .. }));
        assert!(cloud.lock().resources.is_empty());
    }

    #[tokio::test]
    async fn test_immediate_delete_drops_resource() {
        let cloud = SimulatedCloud::new(SimulationScript {
            delete: Vec::new(),
            ..SimulationScript::default()
        });
        let id = cloud.seed("r-1", LifecycleStatus::Available, AttributeMap::new());

        let response = cloud.invoke(SimulatedCloud::DELETE, &json!({"id": id})).await.unwrap();
        assert!(response["status"].is_null());
        assert!(cloud.lock().resources.is_empty());
    }

    #[tokio::test]
    async fn test_kept_deleted_resource_stays_listed() {
        let cloud = SimulatedCloud::new(SimulationScript {
            keep_deleted: true,
            ..SimulationScript::default()
        });
        let id = cloud.seed("r-1", LifecycleStatus::Available, AttributeMap::new());

        cloud.invoke(SimulatedCloud::DELETE, &json!({"id": id})).await.unwrap();
        let query = json!({"id": id});
        cloud.invoke(SimulatedCloud::LIST, &query).await.unwrap();
        assert_eq!(statuses(&cloud.invoke(SimulatedCloud::LIST, &query).await.unwrap()), ["DELETED"]);
        assert_eq!(cloud.lock().resources.len(), 1);
    }

    #[tokio::test]
    async fn test_pagination() {
        let cloud = SimulatedCloud::new(SimulationScript {
            page_size: 2,
            ..SimulationScript::default()
        });
        for id in ["a", "b", "c"] {
            cloud.seed(id, LifecycleStatus::Available, AttributeMap::new());
        }

        let first = cloud.invoke(SimulatedCloud::LIST, &json!({})).await.unwrap();
        assert_eq!(first["Items"].as_array().unwrap().len(), 2);
        assert_eq!(first["NextToken"], "2");

        let second = cloud
            .invoke(SimulatedCloud::LIST, &json!({"NextToken": "2"}))
            .await
            .unwrap();
        assert_eq!(second["Items"][0]["id"], "c");
        assert!(second.get("NextToken").is_none());
    }

    #[tokio::test]
    async fn test_scripted_response_and_call_count() {
        let cloud = SimulatedCloud::new(SimulationScript::default());
        cloud.script_response(
            SimulatedCloud::LIST,
            Err(TransportError::Throttled {
                code: String::from("ThrottlingException"),
                retry_after: None,
            }),
        );

        assert!(cloud.invoke(SimulatedCloud::LIST, &json!({})).await.is_err());
        assert!(cloud.invoke(SimulatedCloud::LIST, &json!({})).await.is_ok());
        assert_eq!(cloud.calls(SimulatedCloud::LIST), 2);
    }
}
