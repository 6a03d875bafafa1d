//! Error types for the lifecycle engine.
//!
//! This module provides the error taxonomy shared by every engine component:
//! identifier codecs, finders, waiters, differs and the reconcile controller.
//! Errors that carry diagnostic state keep the last observed remote snapshot.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::model::StateSnapshot;

/// The main error type for the lifecycle engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The remote resource does not exist (or is in a terminal "gone" status).
    #[error("Resource not found: {target}")]
    NotFound {
        /// What was looked up.
        target: String,
    },

    /// A query documented as unique matched more than one record.
    #[error("Query for {target} matched {count} results, expected exactly one")]
    MultipleResults {
        /// What was looked up.
        target: String,
        /// Number of matching records.
        count: usize,
    },

    /// A resource handle could not be encoded or decoded.
    #[error("Malformed resource handle {handle:?}: {reason} (expected {expected})")]
    MalformedHandle {
        /// The offending handle or part list.
        handle: String,
        /// Human-readable description of the expected format.
        expected: String,
        /// Why the handle was rejected.
        reason: String,
    },

    /// The remote reported a status outside every configured set.
    #[error("{target} reported unexpected status {status}")]
    UnexpectedState {
        /// Resource being waited on.
        target: String,
        /// The unexpected status.
        status: String,
        /// Last observed remote state.
        last: Option<Box<StateSnapshot>>,
    },

    /// The waiter gave up after its configured timeout.
    #[error("Timeout after {elapsed:?} waiting for {target} to reach {expected}")]
    Timeout {
        /// Resource being waited on.
        target: String,
        /// Target statuses that were not reached.
        expected: String,
        /// Time spent waiting.
        elapsed: Duration,
        /// Last observed remote state.
        last: Option<Box<StateSnapshot>>,
    },

    /// The remote reported a terminal failure status.
    #[error("{target} entered failure status {status}")]
    Failure {
        /// Resource being waited on.
        target: String,
        /// The failure status.
        status: String,
        /// Status reason reported by the remote, if any.
        reason: Option<String>,
        /// Last observed remote state.
        last: Option<Box<StateSnapshot>>,
    },

    /// The wait was aborted by an external cancellation signal.
    #[error("Wait for {target} was cancelled")]
    Cancelled {
        /// Resource being waited on.
        target: String,
        /// Last observed remote state.
        last: Option<Box<StateSnapshot>>,
    },

    /// A throttling or network error persisted past the retry budget.
    #[error("Transient error persisted after {attempts} attempts: {message}")]
    Transient {
        /// Description of the last transient error.
        message: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// The remote API rejected a request with a non-classified error.
    #[error("Remote API error {code}: {message}")]
    Remote {
        /// Error code reported by the API.
        code: String,
        /// Error message reported by the API.
        message: String,
    },

    /// The remote API returned something the engine could not interpret.
    #[error("Invalid response from remote API: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// An error raised during one controller phase.
    #[error("{phase} of {handle} failed: {source}")]
    Phase {
        /// Phase in which the error occurred.
        phase: Phase,
        /// Handle of the resource (or `<pending>` before creation).
        handle: String,
        /// The underlying error.
        #[source]
        source: Box<EngineError>,
    },

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification of an [`EngineError`], independent of the phase wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`EngineError::NotFound`].
    NotFound,
    /// See [`EngineError::MultipleResults`].
    MultipleResults,
    /// See [`EngineError::MalformedHandle`].
    MalformedHandle,
    /// See [`EngineError::UnexpectedState`].
    UnexpectedState,
    /// See [`EngineError::Timeout`].
    Timeout,
    /// See [`EngineError::Transient`].
    Transient,
    /// See [`EngineError::Failure`].
    Failure,
    /// See [`EngineError::Cancelled`].
    Cancelled,
    /// See [`EngineError::Remote`].
    Remote,
    /// See [`EngineError::InvalidResponse`].
    InvalidResponse,
    /// See [`EngineError::Config`].
    Config,
    /// See [`EngineError::Io`].
    Io,
    /// See [`EngineError::Internal`].
    Internal,
}

/// Controller phase in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Create call and create-wait.
    Create,
    /// Read of the observed configuration.
    Read,
    /// Diff, apply and update-wait.
    Update,
    /// Delete call and delete-wait.
    Delete,
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// An environment override could not be interpreted.
    #[error("Invalid value for environment variable {name}: {value}")]
    InvalidEnvVar {
        /// Name of the variable.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a not-found error for the given target.
    #[must_use]
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// Creates a malformed-handle error.
    #[must_use]
    pub fn malformed(
        handle: impl Into<String>,
        expected: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedHandle {
            handle: handle.into(),
            expected: expected.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Wraps this error with the phase and handle it occurred in.
    ///
    /// Errors that are already wrapped keep their original phase.
    #[must_use]
    pub fn in_phase(self, phase: Phase, handle: impl Into<String>) -> Self {
        match self {
            Self::Phase { .. } => self,
            other => Self::Phase {
                phase,
                handle: handle.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the classification of this error, looking through phase wrappers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MultipleResults { .. } => ErrorKind::MultipleResults,
            Self::MalformedHandle { .. } => ErrorKind::MalformedHandle,
            Self::UnexpectedState { .. } => ErrorKind::UnexpectedState,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Failure { .. } => ErrorKind::Failure,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Remote { .. } => ErrorKind::Remote,
            Self::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Self::Phase { source, .. } => source.kind(),
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if this error means the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Returns the phase this error occurred in, if it was raised by a controller.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        match self {
            Self::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Returns the handle this error refers to, if it was raised by a controller.
    #[must_use]
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Phase { handle, .. } => Some(handle),
            _ => None,
        }
    }

    /// Returns the last observed remote state attached to this error.
    #[must_use]
    pub fn last_observed(&self) -> Option<&StateSnapshot> {
        match self {
            Self::UnexpectedState { last, .. }
            | Self::Timeout { last, .. }
            | Self::Failure { last, .. }
            | Self::Cancelled { last, .. } => last.as_deref(),
            Self::Phase { source, .. } => source.last_observed(),
            _ => None,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}
