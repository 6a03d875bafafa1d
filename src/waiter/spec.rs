//! Wait specifications.

use std::collections::HashSet;
use std::time::Duration;

use crate::backoff::FibonacciBackoff;
use crate::model::ResourceStatus;

/// Default poll interval in seconds.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Delay between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSchedule {
    /// Same delay between every poll.
    Fixed(Duration),
    /// Fibonacci growth between `min` and `max`.
    Fibonacci {
        /// First delay.
        min: Duration,
        /// Upper bound for any delay.
        max: Duration,
    },
}

/// Stateful iterator over a [`PollSchedule`].
#[derive(Debug, Clone)]
pub(crate) enum PollDelays {
    Fixed(Duration),
    Fibonacci(FibonacciBackoff),
}

impl PollSchedule {
    pub(crate) fn delays(self) -> PollDelays {
        match self {
            Self::Fixed(interval) => PollDelays::Fixed(interval),
            Self::Fibonacci { min, max } => PollDelays::Fibonacci(FibonacciBackoff::new(min, max)),
        }
    }
}

impl PollDelays {
    pub(crate) fn next_delay(&mut self) -> Duration {
        match self {
            Self::Fixed(interval) => *interval,
            Self::Fibonacci(backoff) => backoff.next_backoff(),
        }
    }
}

/// What a waiter waits for.
///
/// Built once per phase and never mutated while a wait runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSpec<S: ResourceStatus> {
    pending: HashSet<S>,
    target: HashSet<S>,
    failure: HashSet<S>,
    target_not_found: bool,
    not_found_checks: u32,
    continuous_target_occurrence: u32,
    schedule: PollSchedule,
    timeout: Duration,
}

impl<S: ResourceStatus> WaitSpec<S> {
    /// Creates an empty spec with the given timeout and a fixed poll interval.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            target: HashSet::new(),
            failure: HashSet::new(),
            target_not_found: false,
            not_found_checks: 0,
            continuous_target_occurrence: 1,
            schedule: PollSchedule::Fixed(Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)),
            timeout,
        }
    }

    /// Statuses that keep the waiter polling.
    #[must_use]
    pub fn pending(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.pending.extend(statuses);
        self
    }

    /// Statuses that end the wait successfully.
    #[must_use]
    pub fn target(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.target.extend(statuses);
        self
    }

    /// Statuses that end the wait with a failure.
    #[must_use]
    pub fn failure(mut self, statuses: impl IntoIterator<Item = S>) -> Self {
        self.failure.extend(statuses);
        self
    }

    /// Treats "not found" as reaching the target.
    #[must_use]
    pub const fn target_not_found(mut self) -> Self {
        self.target_not_found = true;
        self
    }

    /// Tolerates up to `checks` consecutive not-found results while the
    /// resource is still becoming visible.
    #[must_use]
    pub const fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Requires `occurrences` consecutive target observations.
    #[must_use]
    pub const fn continuous_target_occurrence(mut self, occurrences: u32) -> Self {
        self.continuous_target_occurrence = if occurrences == 0 { 1 } else { occurrences };
        self
    }

    /// Polls at a fixed interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.schedule = PollSchedule::Fixed(interval);
        self
    }

    /// Polls with a Fibonacci backoff.
    #[must_use]
    pub const fn poll_schedule(mut self, schedule: PollSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Replaces the timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns true if `status` keeps the waiter polling.
    #[must_use]
    pub fn is_pending(&self, status: &S) -> bool {
        self.pending.contains(status)
    }

    /// Returns true if `status` ends the wait successfully.
    #[must_use]
    pub fn is_target(&self, status: &S) -> bool {
        self.target.contains(status)
    }

    /// Returns true if `status` ends the wait with a failure.
    #[must_use]
    pub fn is_failure(&self, status: &S) -> bool {
        self.failure.contains(status)
    }

    /// Whether "not found" is a target.
    #[must_use]
    pub const fn accepts_not_found(&self) -> bool {
        self.target_not_found
    }

    /// Consecutive not-found results tolerated while pending.
    #[must_use]
    pub const fn tolerated_not_found(&self) -> u32 {
        self.not_found_checks
    }

    /// Consecutive target observations required.
    #[must_use]
    pub const fn required_target_occurrences(&self) -> u32 {
        self.continuous_target_occurrence
    }

    /// Poll schedule.
    #[must_use]
    pub const fn schedule(&self) -> PollSchedule {
        self.schedule
    }

    /// Timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Describes the target for error messages, e.g. `AVAILABLE` or `NotFound`.
    #[must_use]
    pub fn expected(&self) -> String {
        let mut names: Vec<String> = self.target.iter().map(ToString::to_string).collect();
        names.sort();
        if self.target_not_found {
            names.push(String::from("NotFound"));
        }
        names.join("|")
    }
}
