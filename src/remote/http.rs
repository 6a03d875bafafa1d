//! HTTP/JSON transport.
//!
//! Every operation is a `POST` of the JSON parameters to one endpoint, with
//! the operation name in the `X-Operation` header. This is the shape of the
//! JSON-1.1 style cloud APIs; the engine never needs anything richer.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

use crate::config::TransportConfig;
use crate::error::{EngineError, Result};

use super::transport::{Transport, TransportError};

/// Header carrying the operation name.
pub const OPERATION_HEADER: &str = "X-Operation";

/// Retry delay assumed when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Transport that posts JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// HTTP client.
    client: Client,
    /// Endpoint every operation is posted to.
    endpoint: String,
    /// Bearer token, if the API requires one.
    api_key: Option<String>,
    /// Error codes that mean "does not exist".
    not_found_codes: Vec<String>,
    /// Error codes that mean "slow down".
    throttle_codes: Vec<String>,
}

/// Error body returned by the API.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default, alias = "__type", alias = "Code", alias = "errorCode")]
    code: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

impl HttpTransport {
    /// Creates a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is configured or the HTTP client
    /// cannot be created.
    pub fn from_config(config: &TransportConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| EngineError::internal("transport.endpoint is not configured"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EngineError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            not_found_codes: config.not_found_codes.clone(),
            throttle_codes: config.throttle_codes.clone(),
        })
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn classify(&self, status: StatusCode, retry_after: Option<Duration>, body: &str) -> TransportError {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        // AWS-style codes may be namespaced: "com.amazonaws.x#ResourceNotFoundException".
        let code = parsed
            .code
            .as_deref()
            .map(|c| c.rsplit('#').next().unwrap_or(c).to_string())
            .unwrap_or_default();
        let message = parsed.message.unwrap_or_else(|| body.to_string());

        if status == StatusCode::TOO_MANY_REQUESTS || self.throttle_codes.contains(&code) {
            return TransportError::Throttled {
                code,
                retry_after: retry_after.or(Some(Duration::from_secs(DEFAULT_RETRY_AFTER_SECS))),
            };
        }

        if status == StatusCode::NOT_FOUND || self.not_found_codes.contains(&code) {
            return TransportError::NotFound { code, message };
        }

        if status.is_server_error() {
            return TransportError::Server {
                status: status.as_u16(),
                message,
            };
        }

        TransportError::Api {
            status: status.as_u16(),
            code,
            message,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn invoke(&self, operation: &str, params: &Value) -> std::result::Result<Value, TransportError> {
        trace!("POST {} {operation}: {params}", self.endpoint);

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(header::CONTENT_TYPE, "application/json")
            .header(OPERATION_HEADER, operation)
            .json(params);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| TransportError::Network {
            message: format!("Request failed: {e}"),
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let body = response.text().await.map_err(|e| TransportError::Network {
            message: format!("Failed to read response body: {e}"),
        })?;

        if !status.is_success() {
            return Err(self.classify(status, retry_after, &body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| TransportError::InvalidResponse {
            message: format!("Failed to parse response: {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header as header_eq, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> HttpTransport {
        let config = TransportConfig {
            endpoint: Some(server.uri()),
            api_key: Some(String::from("secret")),
            not_found_codes: vec![String::from("ResourceNotFoundException")],
            throttle_codes: vec![String::from("ThrottlingException")],
            ..TransportConfig::default()
        };
        HttpTransport::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_success_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_eq(OPERATION_HEADER, "DescribeWidgets"))
            .and(header_eq("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Items": []})))
            .mount(&server)
            .await;

        let response = transport_for(&server)
            .invoke("DescribeWidgets", &json!({}))
            .await
            .unwrap();
        assert_eq!(response, json!({"Items": []}));
    }

    #[tokio::test]
    async fn test_empty_body_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let response = transport_for(&server).invoke("DeleteWidget", &json!({})).await.unwrap();
        assert_eq!(response, Value::Null);
    }

    #[tokio::test]
    async fn test_configured_code_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "com.amazonaws.widgets#ResourceNotFoundException",
                "message": "Widget w-1 not found"
            })))
            .mount(&server)
            .await;

        let err = transport_for(&server).invoke("DescribeWidget", &json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::NotFound { ref code, .. } if code == "ResourceNotFoundException"));
    }

    #[tokio::test]
    async fn test_unlisted_code_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "ValidationException",
                "message": "Widget not found in this region"
            })))
            .mount(&server)
            .await;

        // The message mentions "not found" but only codes are classified.
        let err = transport_for(&server).invoke("CreateWidget", &json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Api { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_throttling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "5"))
            .mount(&server)
            .await;

        let err = transport_for(&server).invoke("List", &json!({})).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn test_throttle_code_on_400() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"Code": "ThrottlingException"})),
            )
            .mount(&server)
            .await;

        let err = transport_for(&server).invoke("List", &json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Throttled { .. }));
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = transport_for(&server).invoke("List", &json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::Server { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = transport_for(&server).invoke("List", &json!({})).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidResponse { .. }));
    }

    #[test]
    fn test_missing_endpoint() {
        assert!(HttpTransport::from_config(&TransportConfig::default()).is_err());
    }
}
