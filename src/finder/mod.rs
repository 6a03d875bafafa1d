//! Finders: idempotent lookups against paginated collection APIs.
//!
//! A [`Finder`] fetches every page of a list query before filtering, folds
//! "zero results", transport not-found errors and terminal "gone" statuses
//! into [`EngineError::NotFound`], and retries transient failures through a
//! [`RetryPolicy`].

mod decode;
mod query;

pub use decode::{FieldDecoder, RecordDecoder};
pub use query::{Filter, Pagination, Query};

use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::model::{RemoteState, ResourceStatus};
use crate::remote::{RetryPolicy, Transport};

/// Paginated lookup of remote records.
pub struct Finder<S> {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    pagination: Pagination,
    decoder: Arc<dyn RecordDecoder<S>>,
    gone: HashSet<S>,
}

impl<S: ResourceStatus> Finder<S> {
    /// Creates a finder over `transport` that decodes records with `decoder`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, decoder: Arc<dyn RecordDecoder<S>>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            pagination: Pagination::default(),
            decoder,
            gone: HashSet::new(),
        }
    }

    /// Sets the retry policy for list calls.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the pagination descriptor.
    #[must_use]
    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = pagination;
        self
    }

    /// Statuses that mean the resource no longer exists.
    #[must_use]
    pub fn with_gone_statuses(mut self, gone: impl IntoIterator<Item = S>) -> Self {
        self.gone = gone.into_iter().collect();
        self
    }

    /// Returns every record matching `query`.
    ///
    /// All pages are fetched before filtering. Records in a gone status are
    /// dropped. A transport not-found error on the first page means an
    /// empty result; on a later page it is an `InvalidResponse`.
    ///
    /// # Errors
    ///
    /// Returns `Transient` when retries are exhausted, `InvalidResponse` for
    /// undecodable pages or a pagination loop, and any other non-transient
    /// remote error.
    pub async fn list(&self, query: &Query<S>) -> Result<Vec<RemoteState<S>>> {
        let mut records = Vec::new();
        let mut token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        for page in 1..=self.pagination.max_pages {
            let params = query.page_params(&self.pagination, token.as_deref());
            let response = match self
                .retry
                .invoke(self.transport.as_ref(), query.operation(), &params, query.description())
                .await
            {
                Ok(response) => response,
                Err(err) if err.is_not_found() && page == 1 => {
                    debug!("{} returned not-found on page 1", query.operation());
                    return Ok(Vec::new());
                }
                Err(err) if err.is_not_found() => {
                    return Err(EngineError::invalid_response(format!(
                        "{} returned not-found on page {page} after {} record(s): {err}",
                        query.operation(),
                        records.len()
                    )));
                }
                Err(err) => return Err(err),
            };

            let items = self.pagination.items(&response).ok_or_else(|| {
                EngineError::invalid_response(format!(
                    "{} response field {} is not an array",
                    query.operation(),
                    self.pagination.items_path
                ))
            })?;
            debug!("{} page {page}: {} item(s)", query.operation(), items.len());

            for item in items {
                records.push(self.decoder.decode(item)?);
            }

            match self.pagination.next_token(&response) {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(EngineError::invalid_response(format!(
                        "{} repeated continuation token {next}",
                        query.operation()
                    )));
                }
                Some(next) => token = Some(next),
                None => return Ok(self.filter(query, records)),
            }
        }

        Err(EngineError::invalid_response(format!(
            "{} exceeded {} pages",
            query.operation(),
            self.pagination.max_pages
        )))
    }

    /// Returns the single record matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for zero matches and `MultipleResults` for more
    /// than one, plus everything [`Finder::list`] returns.
    pub async fn find_one(&self, query: &Query<S>) -> Result<RemoteState<S>> {
        let mut records = self.list(query).await?;
        match records.len() {
            0 => Err(EngineError::not_found(query.description())),
            1 => records.pop().ok_or_else(|| EngineError::not_found(query.description())),
            count => Err(EngineError::MultipleResults {
                target: query.description().to_string(),
                count,
            }),
        }
    }

    /// Returns the record with identifier `id`.
    ///
    /// The record's own identifier must equal `id` exactly; a mismatch (a
    /// stale or misrouted read) is reported as `NotFound`.
    ///
    /// # Errors
    ///
    /// Everything [`Finder::find_one`] returns.
    pub async fn find_by_id(&self, query: &Query<S>, id: &str) -> Result<RemoteState<S>> {
        let state = self.find_one(query).await?;
        if state.id() != id {
            debug!("Expected record {id}, remote returned {}", state.id());
            return Err(EngineError::not_found(query.description()));
        }
        Ok(state)
    }

    fn filter(&self, query: &Query<S>, records: Vec<RemoteState<S>>) -> Vec<RemoteState<S>> {
        records
            .into_iter()
            .filter(|state| !self.gone.contains(state.status()))
            .filter(|state| query.filters().iter().all(|f| f.matches(state)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{AttributeMap, LifecycleStatus};
    use crate::remote::{MockTransport, TransportError};
    use mockall::predicate::{always, eq};
    use serde_json::{Value, json};

    fn finder(transport: MockTransport) -> Finder<LifecycleStatus> {
        Finder::new(Arc::new(transport), Arc::new(FieldDecoder::default()))
            .with_gone_statuses([LifecycleStatus::Deleted])
    }

    fn record(id: &str, status: &str, name: &str) -> Value {
        json!({"id": id, "status": status, "attributes": {"name": name}})
    }

    #[tokio::test]
    async fn test_all_pages_fetched_before_filtering() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .with(eq("ListWidgets"), eq(json!({})))
            .times(1)
            .returning(|_, _| Ok(json!({"Items": [record("w-1", "ACTIVE", "web")], "NextToken": "p2"})));
        transport
            .expect_invoke()
            .with(eq("ListWidgets"), eq(json!({"NextToken": "p2"})))
            .times(1)
            .returning(|_, _| Ok(json!({"Items": [record("w-2", "ACTIVE", "api")]})));

        let query = Query::new("ListWidgets", "widget api").attribute_equals("name", "api");
        let state = finder(transport).find_one(&query).await.unwrap();
        assert_eq!(state.id(), "w-2");
    }

    #[tokio::test]
    async fn test_not_found_on_later_page_keeps_error() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .with(eq("ListWidgets"), eq(json!({})))
            .times(1)
            .returning(|_, _| Ok(json!({"Items": [record("w-1", "ACTIVE", "web")], "NextToken": "p2"})));
        transport
            .expect_invoke()
            .with(eq("ListWidgets"), eq(json!({"NextToken": "p2"})))
            .times(1)
            .returning(|_, _| {
                Err(TransportError::NotFound {
                    code: String::from("ResourceNotFoundException"),
                    message: String::from("token expired"),
                })
            });

        let err = finder(transport)
            .find_one(&Query::new("ListWidgets", "widget web"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
        assert!(err.to_string().contains("page 2"));
    }

    #[tokio::test]
    async fn test_two_matches_is_multiple_results() {
        let mut transport = MockTransport::new();
        transport.expect_invoke().returning(|_, _| {
            Ok(json!({"Items": [record("w-1", "ACTIVE", "web"), record("w-2", "ACTIVE", "web")]}))
        });

        let query = Query::new("ListWidgets", "widget web").attribute_equals("name", "web");
        let err = finder(transport).find_one(&query).await.unwrap_err();
        assert!(matches!(err, EngineError::MultipleResults { count: 2, .. }));
    }

    #[tokio::test]
    async fn test_zero_results_and_gone_status_are_not_found() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .returning(|_, _| Ok(json!({"Items": [record("w-1", "TERMINATED", "web")]})));

        let query = Query::new("ListWidgets", "widget web");
        let err = finder(transport).find_one(&query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_transport_not_found_is_empty() {
        let mut transport = MockTransport::new();
        transport.expect_invoke().returning(|_, _| {
            Err(TransportError::NotFound {
                code: String::from("ResourceNotFoundException"),
                message: String::from("no such parent"),
            })
        });

        let query = Query::new("ListWidgets", "widgets");
        let finder = finder(transport);
        assert!(finder.list(&query).await.unwrap().is_empty());
        assert!(finder.find_one(&query).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_identifier_mismatch_is_not_found() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .returning(|_, _| Ok(json!({"Items": [record("w-1-old", "ACTIVE", "web")]})));

        let query = Query::new("ListWidgets", "widget w-1").param("id", "w-1");
        let err = finder(transport).find_by_id(&query, "w-1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttling_is_retried_not_not_found() {
        let mut transport = MockTransport::new();
        transport.expect_invoke().with(always(), always()).times(3).returning(|_, _| {
            Err(TransportError::Throttled {
                code: String::from("ThrottlingException"),
                retry_after: None,
            })
        });

        let query = Query::new("ListWidgets", "widgets");
        let err = finder(transport).list(&query).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[tokio::test]
    async fn test_repeated_token_is_rejected() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .returning(|_, _| Ok(json!({"Items": [], "NextToken": "same"})));

        let err = finder(transport).list(&Query::new("ListWidgets", "widgets")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_closure_decoder() {
        let mut transport = MockTransport::new();
        transport
            .expect_invoke()
            .returning(|_, _| Ok(json!({"Items": [{"arn": "w-1"}]})));

        let decoder = |record: &Value| -> Result<RemoteState<LifecycleStatus>> {
            let id = record["arn"].as_str().unwrap_or_default();
            Ok(RemoteState::new(id, LifecycleStatus::Available, AttributeMap::new()))
        };
        let finder: Finder<LifecycleStatus> = Finder::new(Arc::new(transport), Arc::new(decoder));
        let state = finder.find_one(&Query::new("ListWidgets", "widgets")).await.unwrap();
        assert_eq!(state.id(), "w-1");
    }
}
