//! Remote transport abstraction.
//!
//! The engine talks to a remote API through one narrow call:
//! `invoke(operation, params) -> response`. Concrete request and response
//! shapes belong to the resource kinds; the transport only moves JSON and
//! classifies failures.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::error::EngineError;

/// Classified failure of a single transport call.
///
/// Classification uses HTTP status codes and API error codes, never error
/// message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The API reported that the addressed object does not exist.
    #[error("not found ({code}): {message}")]
    NotFound {
        /// API error code.
        code: String,
        /// API error message.
        message: String,
    },

    /// The API rejected the call because of rate limiting.
    #[error("throttled ({code})")]
    Throttled {
        /// API error code.
        code: String,
        /// Delay the API asked for, if any.
        retry_after: Option<Duration>,
    },

    /// The request never produced a response.
    #[error("network error: {message}")]
    Network {
        /// Description of the network failure.
        message: String,
    },

    /// The API failed on its side (5xx).
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body or error message.
        message: String,
    },

    /// The API rejected the request.
    #[error("API error {status} ({code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// API error code.
        code: String,
        /// API error message.
        message: String,
    },

    /// The response could not be interpreted.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// A generic request/response call against a remote API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invokes a remote operation with JSON parameters.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransportError`] if the call fails.
    async fn invoke(&self, operation: &str, params: &Value) -> Result<Value, TransportError>;
}

impl TransportError {
    /// Returns true for throttling, network and server errors.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Throttled { .. } | Self::Network { .. } | Self::Server { .. }
        )
    }

    /// Returns the delay the API asked for before retrying, if any.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Throttled { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Converts a non-transient failure into an engine error.
    ///
    /// `target` names what was being addressed, for not-found errors.
    #[must_use]
    pub fn into_engine_error(self, target: &str) -> EngineError {
        match self {
            Self::NotFound { .. } => EngineError::not_found(target),
            Self::Throttled { .. } | Self::Network { .. } | Self::Server { .. } => EngineError::Transient {
                message: self.to_string(),
                attempts: 1,
            },
            Self::Api { code, message, .. } => EngineError::Remote { code, message },
            Self::InvalidResponse { message } => EngineError::InvalidResponse { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Throttled {
            code: String::from("ThrottlingException"),
            retry_after: None,
        }
        .is_transient());
        assert!(TransportError::Server {
            status: 503,
            message: String::new(),
        }
        .is_transient());
        assert!(!TransportError::NotFound {
            code: String::from("ResourceNotFoundException"),
            message: String::new(),
        }
        .is_transient());
    }

    #[test]
    fn test_not_found_converts_to_engine_not_found() {
        let err = TransportError::NotFound {
            code: String::from("NoSuchEntity"),
            message: String::from("role app does not exist"),
        }
        .into_engine_error("role app");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("role app"));
    }

    #[test]
    fn test_api_error_converts_to_remote() {
        let err = TransportError::Api {
            status: 400,
            code: String::from("ValidationException"),
            message: String::from("size must be positive"),
        }
        .into_engine_error("x");
        assert_eq!(err.kind(), ErrorKind::Remote);
    }
}
