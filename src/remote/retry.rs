//! Retry of transient transport failures.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backoff::FibonacciBackoff;
use crate::error::{EngineError, Result};

use super::transport::{Transport, TransportError};

/// Default number of attempts per call.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay unit between attempts in milliseconds.
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBackoff {
    /// `delay * attempt`.
    Linear(Duration),
    /// Fibonacci growth between `min` and `max`.
    Fibonacci {
        /// First delay.
        min: Duration,
        /// Upper bound for any delay.
        max: Duration,
    },
}

/// Retry budget for transient transport errors.
///
/// Throttling, network and server errors are retried; everything else is
/// converted to an [`EngineError`] on the first occurrence. A `retry-after`
/// hint from the API takes precedence over the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: RetryBackoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: RetryBackoff::Linear(Duration::from_millis(DEFAULT_RETRY_DELAY_MS)),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: RetryBackoff) -> Self {
        Self {
            max_attempts: if max_attempts == 0 { 1 } else { max_attempts },
            backoff,
        }
    }

    /// A policy that makes a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self::new(1, RetryBackoff::Linear(Duration::ZERO))
    }

    /// Maximum number of attempts per call.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Invokes `operation`, retrying transient failures.
    ///
    /// `target` names what is being addressed and ends up in not-found errors.
    ///
    /// # Errors
    ///
    /// Returns `Transient` once the attempt budget is exhausted, or the
    /// converted transport error for non-transient failures.
    pub async fn invoke(
        &self,
        transport: &dyn Transport,
        operation: &str,
        params: &Value,
        target: &str,
    ) -> Result<Value> {
        let mut fibonacci = match self.backoff {
            RetryBackoff::Fibonacci { min, max } => Some(FibonacciBackoff::new(min, max)),
            RetryBackoff::Linear(_) => None,
        };
        let mut last_error: Option<TransportError> = None;

        for attempt in 1..=self.max_attempts {
            if let Some(err) = &last_error {
                let delay = err
                    .retry_after()
                    .unwrap_or_else(|| self.computed_delay(attempt - 1, fibonacci.as_mut()));
                warn!(
                    "{operation} for {target} failed ({err}), retry {attempt}/{} in {delay:?}",
                    self.max_attempts
                );
                tokio::time::sleep(delay).await;
            }

            debug!("Invoking {operation} (attempt {attempt})");
            match transport.invoke(operation, params).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() => last_error = Some(err),
                Err(err) => return Err(err.into_engine_error(target)),
            }
        }

        Err(EngineError::Transient {
            message: last_error.map_or_else(|| String::from("no attempt made"), |e| e.to_string()),
            attempts: self.max_attempts,
        })
    }

    fn computed_delay(&self, retry: u32, fibonacci: Option<&mut FibonacciBackoff>) -> Duration {
        match (self.backoff, fibonacci) {
            (_, Some(backoff)) => backoff.next_backoff(),
            (RetryBackoff::Linear(unit), None) => unit.saturating_mul(retry),
            (RetryBackoff::Fibonacci { min, .. }, None) => min,
        }
    }
}
