//! Engine configuration types.
//!
//! These structs map to the `lifecycle.yaml` file. Every section has
//! defaults, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use validator::Validate;

use crate::differ::TagPolicy;
use crate::reconciler::WaitOverrides;
use crate::remote::{RetryBackoff, RetryPolicy};
use crate::waiter::PollSchedule;

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct EngineConfig {
    /// Wait timeouts and poll schedule.
    #[validate(nested)]
    pub waits: WaitConfig,
    /// Remote endpoint and error classification.
    #[validate(nested)]
    pub transport: TransportConfig,
    /// Retry policy for transient errors.
    #[validate(nested)]
    pub retry: RetryConfig,
    /// Tag handling.
    pub tags: TagConfig,
}

/// Poll schedule kind.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleKind {
    /// Fixed interval.
    #[default]
    Fixed,
    /// Fibonacci growth.
    Fibonacci,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Fixed => "fixed",
            Self::Fibonacci => "fibonacci",
        };
        write!(f, "{s}")
    }
}

/// Wait configuration. Timeouts left unset keep each kind's own default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct WaitConfig {
    /// Create-wait timeout in seconds.
    #[validate(range(min = 1))]
    pub create_timeout_secs: Option<u64>,
    /// Update-wait timeout in seconds.
    #[validate(range(min = 1))]
    pub update_timeout_secs: Option<u64>,
    /// Delete-wait timeout in seconds.
    #[validate(range(min = 1))]
    pub delete_timeout_secs: Option<u64>,
    /// Schedule kind.
    pub schedule: ScheduleKind,
    /// Fixed interval, or first Fibonacci delay, in seconds.
    #[validate(range(min = 1))]
    pub poll_interval_secs: u64,
    /// Largest Fibonacci delay in seconds.
    #[validate(range(min = 1))]
    pub max_poll_interval_secs: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            create_timeout_secs: None,
            update_timeout_secs: None,
            delete_timeout_secs: None,
            schedule: ScheduleKind::Fixed,
            poll_interval_secs: 10,
            max_poll_interval_secs: 60,
        }
    }
}

impl WaitConfig {
    /// Poll schedule described by this section.
    #[must_use]
    pub const fn poll_schedule(&self) -> PollSchedule {
        let min = Duration::from_secs(self.poll_interval_secs);
        match self.schedule {
            ScheduleKind::Fixed => PollSchedule::Fixed(min),
            ScheduleKind::Fibonacci => PollSchedule::Fibonacci {
                min,
                max: Duration::from_secs(self.max_poll_interval_secs),
            },
        }
    }
}

impl From<&WaitConfig> for WaitOverrides {
    fn from(config: &WaitConfig) -> Self {
        Self {
            create_timeout: config.create_timeout_secs.map(Duration::from_secs),
            update_timeout: config.update_timeout_secs.map(Duration::from_secs),
            delete_timeout: config.delete_timeout_secs.map(Duration::from_secs),
            poll: Some(config.poll_schedule()),
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL of the remote API. Unset means the simulated remote.
    #[validate(url)]
    pub endpoint: Option<String>,
    /// Bearer token; usually supplied through `LIFECYCLE_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    #[validate(range(min = 1, max = 600))]
    pub request_timeout_secs: u64,
    /// Error codes meaning "resource not found".
    pub not_found_codes: Vec<String>,
    /// Error codes meaning "throttled".
    pub throttle_codes: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            request_timeout_secs: 30,
            not_found_codes: vec![String::from("ResourceNotFoundException")],
            throttle_codes: vec![
                String::from("ThrottlingException"),
                String::from("TooManyRequestsException"),
            ],
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, including the first.
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,
    /// Backoff kind.
    pub backoff: ScheduleKind,
    /// Linear unit delay, or first Fibonacci delay, in milliseconds.
    pub delay_ms: u64,
    /// Largest Fibonacci delay in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: ScheduleKind::Fixed,
            delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        let delay = Duration::from_millis(config.delay_ms);
        let backoff = match config.backoff {
            ScheduleKind::Fixed => RetryBackoff::Linear(delay),
            ScheduleKind::Fibonacci => RetryBackoff::Fibonacci {
                min: delay,
                max: Duration::from_millis(config.max_delay_ms),
            },
        };
        Self::new(config.max_attempts, backoff)
    }
}

/// Tag configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TagConfig {
    /// Treat `aws:` keys as provider-owned.
    pub aws_reserved: bool,
    /// Additional provider-owned key prefixes.
    pub reserved_prefixes: Vec<String>,
    /// Keys excluded from every diff.
    pub ignored_keys: Vec<String>,
    /// Tags applied to every resource unless set explicitly.
    pub default_tags: BTreeMap<String, String>,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            aws_reserved: true,
            reserved_prefixes: Vec::new(),
            ignored_keys: Vec::new(),
            default_tags: BTreeMap::new(),
        }
    }
}

impl From<&TagConfig> for TagPolicy {
    fn from(config: &TagConfig) -> Self {
        let mut policy = if config.aws_reserved { Self::aws() } else { Self::default() };
        policy.reserved_prefixes.extend(config.reserved_prefixes.iter().cloned());
        for key in &config.ignored_keys {
            policy = policy.with_ignored_key(key.clone());
        }
        for (key, value) in &config.default_tags {
            policy = policy.with_default_tag(key.clone(), value.clone());
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.waits.poll_schedule(), PollSchedule::Fixed(Duration::from_secs(10)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_wait_overrides_from_config() {
        let waits = WaitConfig {
            delete_timeout_secs: Some(120),
            schedule: ScheduleKind::Fibonacci,
            poll_interval_secs: 2,
            max_poll_interval_secs: 30,
            ..WaitConfig::default()
        };
        let overrides = WaitOverrides::from(&waits);

        assert_eq!(overrides.create_timeout, None);
        assert_eq!(overrides.delete_timeout, Some(Duration::from_secs(120)));
        assert_eq!(
            overrides.poll,
            Some(PollSchedule::Fibonacci {
                min: Duration::from_secs(2),
                max: Duration::from_secs(30),
            })
        );
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig { max_attempts: 5, ..RetryConfig::default() });
        assert_eq!(policy.max_attempts(), 5);
    }

    #[test]
    fn test_tag_policy_from_config() {
        let config = TagConfig {
            ignored_keys: vec![String::from("LastSeen")],
            default_tags: BTreeMap::from([(String::from("team"), String::from("infra"))]),
            ..TagConfig::default()
        };
        let policy = TagPolicy::from(&config);

        assert!(policy.is_excluded("aws:cloudformation:stack-name"));
        assert!(policy.is_excluded("LastSeen"));
        assert_eq!(policy.default_tags.get("team").map(String::as_str), Some("infra"));
    }

    #[test]
    fn test_derived_validation_rejects_zero_attempts() {
        let config = EngineConfig {
            retry: RetryConfig { max_attempts: 0, ..RetryConfig::default() },
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
