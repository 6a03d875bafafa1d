//! Configuration validation.
//!
//! Field ranges are declared on the config structs with the `validator`
//! derive; this module runs them and adds the checks that span fields.

use crate::error::{ConfigError, EngineError, Result};
use std::collections::BTreeSet;
use tracing::debug;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use super::spec::{EngineConfig, RetryConfig, ScheduleKind, TagConfig, TransportConfig, WaitConfig};

/// Validator for engine configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an engine configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error; warnings never fail.
    pub fn validate(&self, config: &EngineConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        match result.errors.first() {
            None => {
                debug!("Configuration validation passed with {} warning(s)", result.warnings.len());
                Ok(result)
            }
            Some(first) => Err(EngineError::Config(ConfigError::validation(
                first.message.clone(),
                first.field.clone(),
            ))),
        }
    }

    /// Runs every check and collects all errors and warnings.
    #[must_use]
    pub fn check(&self, config: &EngineConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        if let Err(errors) = config.validate() {
            flatten("", &errors, &mut result);
        }
        Self::validate_waits(&config.waits, &mut result);
        Self::validate_transport(&config.transport, &mut result);
        Self::validate_retry(&config.retry, &mut result);
        Self::validate_tags(&config.tags, &mut result);

        result
    }

    fn validate_waits(waits: &WaitConfig, result: &mut ValidationResult) {
        let timeouts = [
            ("waits.create_timeout_secs", waits.create_timeout_secs),
            ("waits.update_timeout_secs", waits.update_timeout_secs),
            ("waits.delete_timeout_secs", waits.delete_timeout_secs),
        ];
        for (field, timeout) in timeouts {
            let Some(timeout) = timeout else { continue };
            if waits.poll_interval_secs >= timeout {
                result.error(
                    field,
                    format!(
                        "Timeout of {timeout}s must be longer than the poll interval of {}s",
                        waits.poll_interval_secs
                    ),
                );
            }
        }

        if waits.schedule == ScheduleKind::Fibonacci && waits.poll_interval_secs > waits.max_poll_interval_secs {
            result.error(
                "waits.max_poll_interval_secs",
                "Largest poll interval must not be below the first poll interval",
            );
        }
    }

    fn validate_transport(transport: &TransportConfig, result: &mut ValidationResult) {
        let not_found: BTreeSet<&str> = transport.not_found_codes.iter().map(String::as_str).collect();
        for code in &transport.throttle_codes {
            if not_found.contains(code.as_str()) {
                result.error(
                    "transport.throttle_codes",
                    format!("Error code '{code}' is listed as both not-found and throttled"),
                );
            }
        }

        match &transport.endpoint {
            Some(endpoint) if endpoint.starts_with("http://") && transport.api_key.is_some() => {
                result
                    .warnings
                    .push(format!("transport.endpoint: API key will be sent unencrypted to {endpoint}"));
            }
            Some(_) => {}
            None => result
                .warnings
                .push(String::from("transport.endpoint: not set, only the simulated remote is available")),
        }
    }

    fn validate_retry(retry: &RetryConfig, result: &mut ValidationResult) {
        if retry.backoff == ScheduleKind::Fibonacci && retry.delay_ms > retry.max_delay_ms {
            result.error("retry.max_delay_ms", "Largest retry delay must not be below the first delay");
        }
        if retry.delay_ms == 0 && retry.max_attempts > 1 {
            result
                .warnings
                .push(String::from("retry.delay_ms: retries will be sent without any delay"));
        }
    }

    fn validate_tags(tags: &TagConfig, result: &mut ValidationResult) {
        let mut reserved: Vec<&str> = tags.reserved_prefixes.iter().map(String::as_str).collect();
        if tags.aws_reserved {
            reserved.push("aws:");
        }

        for key in tags.default_tags.keys() {
            if key.is_empty() {
                result.error("tags.default_tags", "Tag keys cannot be empty");
            } else if reserved.iter().any(|prefix| key.starts_with(prefix)) {
                result.error(
                    format!("tags.default_tags.{key}"),
                    format!("Default tag '{key}' uses a reserved prefix"),
                );
            }
            if tags.ignored_keys.contains(key) {
                result.warnings.push(format!(
                    "tags.default_tags.{key}: key is also ignored and will never be diffed"
                ));
            }
        }
    }
}

fn flatten(prefix: &str, errors: &ValidationErrors, result: &mut ValidationResult) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Struct(nested) => flatten(&path, nested, result),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    flatten(&format!("{path}[{index}]"), nested, result);
                }
            }
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map_or_else(|| format!("Invalid value ({})", error.code), ToString::to_string);
                    result.error(path.clone(), message);
                }
            }
        }
    }
}
