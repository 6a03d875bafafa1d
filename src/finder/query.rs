//! Queries, filters and pagination descriptors.

use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::model::{AttrValue, RemoteState, ResourceStatus};

/// Where pagination tokens live in requests and responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Request parameter that carries the continuation token.
    pub token_param: String,
    /// Response field holding the next continuation token.
    pub token_field: String,
    /// Dot path of the item array in the response, e.g. `Items` or `data.items`.
    pub items_path: String,
    /// Upper bound on pages fetched for one query.
    pub max_pages: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            token_param: String::from("NextToken"),
            token_field: String::from("NextToken"),
            items_path: String::from("Items"),
            max_pages: 1000,
        }
    }
}

impl Pagination {
    /// Returns the item array at `items_path`. A missing path is an empty page.
    pub(crate) fn items<'a>(&self, response: &'a Value) -> Option<&'a [Value]> {
        let mut node = response;
        for segment in self.items_path.split('.').filter(|s| !s.is_empty()) {
            match node.get(segment) {
                Some(child) => node = child,
                None => return Some(&[]),
            }
        }
        match node {
            Value::Array(items) => Some(items),
            Value::Null => Some(&[]),
            _ => None,
        }
    }

    /// Returns the continuation token, treating an empty string as absent.
    pub(crate) fn next_token(&self, response: &Value) -> Option<String> {
        response
            .get(&self.token_field)
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(String::from)
    }
}

/// Client-side filter applied after all pages are collected.
#[derive(Debug, Clone)]
pub enum Filter<S> {
    /// Attribute `name` equals `value`.
    AttributeEquals {
        /// Attribute name.
        name: String,
        /// Expected value.
        value: AttrValue,
    },
    /// Status is one of the listed statuses.
    StatusIn(HashSet<S>),
}

impl<S: ResourceStatus> Filter<S> {
    /// Returns true if `state` passes the filter.
    #[must_use]
    pub fn matches(&self, state: &RemoteState<S>) -> bool {
        match self {
            Self::AttributeEquals { name, value } => state.attributes().get(name) == Some(value),
            Self::StatusIn(statuses) => statuses.contains(state.status()),
        }
    }
}

/// A list query: operation, server-side parameters and client-side filters.
#[derive(Debug, Clone)]
pub struct Query<S> {
    operation: String,
    params: Map<String, Value>,
    filters: Vec<Filter<S>>,
    description: String,
}

impl<S: ResourceStatus> Query<S> {
    /// Creates a query that invokes `operation`.
    ///
    /// `description` names what is looked up in errors and logs.
    #[must_use]
    pub fn new(operation: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            params: Map::new(),
            filters: Vec::new(),
            description: description.into(),
        }
    }

    /// Adds a server-side request parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Adds a client-side attribute filter.
    #[must_use]
    pub fn attribute_equals(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.filters.push(Filter::AttributeEquals {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Adds a client-side status filter.
    #[must_use]
    pub fn status_in(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.filters.push(Filter::StatusIn(statuses.into_iter().collect()));
        self
    }

    /// Operation invoked for each page.
    #[must_use]
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// What is looked up.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Client-side filters.
    #[must_use]
    pub fn filters(&self) -> &[Filter<S>] {
        &self.filters
    }

    /// Request parameters for one page.
    pub(crate) fn page_params(&self, pagination: &Pagination, token: Option<&str>) -> Value {
        let mut params = self.params.clone();
        if let Some(token) = token {
            params.insert(pagination.token_param.clone(), Value::String(token.to_string()));
        }
        Value::Object(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeMap, LifecycleStatus};
    use serde_json::json;

    #[test]
    fn test_items_dot_path() {
        let pagination = Pagination {
            items_path: String::from("data.items"),
            ..Pagination::default()
        };
        let response = json!({"data": {"items": [1, 2]}});
        assert_eq!(pagination.items(&response).map(<[Value]>::len), Some(2));
        assert_eq!(pagination.items(&json!({})).map(<[Value]>::len), Some(0));
        assert!(pagination.items(&json!({"data": {"items": "nope"}})).is_none());
    }

    #[test]
    fn test_empty_token_is_absent() {
        let pagination = Pagination::default();
        assert_eq!(pagination.next_token(&json!({"NextToken": ""})), None);
        assert_eq!(pagination.next_token(&json!({"NextToken": "abc"})).as_deref(), Some("abc"));
    }

    #[test]
    fn test_filters() {
        let state = RemoteState::new(
            "w-1",
            LifecycleStatus::Available,
            AttributeMap::new().with("name", "web"),
        );
        let query = Query::new("ListWidgets", "widget web")
            .attribute_equals("name", "web")
            .status_in([LifecycleStatus::Available]);
        assert!(query.filters().iter().all(|f| f.matches(&state)));

        let other = Filter::AttributeEquals {
            name: String::from("name"),
            value: AttrValue::from("api"),
        };
        assert!(!other.matches(&state));
    }

    #[test]
    fn test_page_params() {
        let query: Query<LifecycleStatus> = Query::new("ListWidgets", "widgets").param("Limit", 10);
        let pagination = Pagination::default();
        assert_eq!(query.page_params(&pagination, None), json!({"Limit": 10}));
        assert_eq!(
            query.page_params(&pagination, Some("t1")),
            json!({"Limit": 10, "NextToken": "t1"})
        );
    }
}
