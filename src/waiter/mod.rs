//! Waiters: polling state machines over a refresh function.
//!
//! ```text
//! Pending* -> Target     success, final state returned
//! Pending* -> Failure    Failure error with the last state
//! Pending* -> (timeout)  Timeout error with the last state
//! other status           UnexpectedState, immediately
//! ```
//!
//! The first poll happens immediately. Between polls the waiter sleeps on
//! the tokio timer, never longer than the time left before the timeout, so
//! the final poll lands exactly on the deadline. A cancellation token aborts
//! the sleep. A refresh that still fails transiently after its own retries
//! counts as a pending poll; only the waiter's timeout ends the wait.

mod spec;

pub use spec::{PollSchedule, WaitSpec};

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{EngineError, Result};
use crate::model::{RemoteState, ResourceStatus};

/// Result of a successful wait.
#[derive(Debug, Clone)]
pub struct WaitOutcome<S> {
    /// Final state; `None` when the resource disappeared and that was the target.
    pub state: Option<RemoteState<S>>,
    /// Number of refresh calls made.
    pub polls: u32,
    /// Time spent waiting.
    pub elapsed: Duration,
}

/// Polls `refresh` until `spec` is satisfied.
///
/// `target` names the resource in logs and errors.
///
/// # Errors
///
/// - `Failure` when a failure status is observed
/// - `UnexpectedState` for a status outside every set
/// - `Timeout` once the timeout has elapsed without reaching the target
/// - `Cancelled` when `cancel` fires
/// - `NotFound` when the resource disappears and that is not the target
/// - any non-transient error `refresh` returns
pub async fn wait_for<S, F, Fut>(
    target: &str,
    spec: &WaitSpec<S>,
    cancel: &CancellationToken,
    mut refresh: F,
) -> Result<WaitOutcome<S>>
where
    S: ResourceStatus,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RemoteState<S>>>,
{
    let start = Instant::now();
    let mut delays = spec.schedule().delays();
    let mut last: Option<RemoteState<S>> = None;
    let mut polls = 0_u32;
    let mut not_found_streak = 0_u32;
    let mut target_streak = 0_u32;

    info!("Waiting up to {:?} for {target} to reach {}", spec.timeout(), spec.expected());

    loop {
        if cancel.is_cancelled() {
            return Err(cancelled(target, last.as_ref()));
        }

        polls += 1;
        match refresh().await {
            Err(err) if err.is_not_found() => {
                if spec.accepts_not_found() {
                    info!("{target} is gone after {polls} poll(s)");
                    return Ok(WaitOutcome {
                        state: None,
                        polls,
                        elapsed: start.elapsed(),
                    });
                }
                not_found_streak += 1;
                target_streak = 0;
                if not_found_streak > spec.tolerated_not_found() {
                    return Err(err);
                }
                debug!("{target} not visible yet ({not_found_streak}/{})", spec.tolerated_not_found());
            }
            Err(err) if err.is_retryable() => {
                debug!("Poll {polls}: {target} refresh failed transiently: {err}");
            }
            Err(err) => return Err(err),
            Ok(state) => {
                not_found_streak = 0;
                let status = state.status().clone();
                debug!("Poll {polls}: {target} is {status}");

                if spec.is_failure(&status) {
                    return Err(EngineError::Failure {
                        target: target.to_string(),
                        status: status.to_string(),
                        reason: state.status_reason().map(String::from),
                        last: Some(Box::new(state.snapshot())),
                    });
                }

                if spec.is_target(&status) {
                    target_streak += 1;
                    if target_streak >= spec.required_target_occurrences() {
                        info!("{target} reached {status} after {polls} poll(s)");
                        return Ok(WaitOutcome {
                            state: Some(state),
                            polls,
                            elapsed: start.elapsed(),
                        });
                    }
                } else if spec.is_pending(&status) {
                    target_streak = 0;
                } else {
                    return Err(EngineError::UnexpectedState {
                        target: target.to_string(),
                        status: status.to_string(),
                        last: Some(Box::new(state.snapshot())),
                    });
                }
                last = Some(state);
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= spec.timeout() {
            return Err(EngineError::Timeout {
                target: target.to_string(),
                expected: spec.expected(),
                elapsed,
                last: last.as_ref().map(|s| Box::new(s.snapshot())),
            });
        }

        let delay = delays.next_delay().min(spec.timeout() - elapsed);
        tokio::select! {
            () = cancel.cancelled() => return Err(cancelled(target, last.as_ref())),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

fn cancelled<S: ResourceStatus>(target: &str, last: Option<&RemoteState<S>>) -> EngineError {
    EngineError::Cancelled {
        target: target.to_string(),
        last: last.map(|s| Box::new(s.snapshot())),
    }
}
