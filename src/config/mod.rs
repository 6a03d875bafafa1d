//! Engine configuration.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `lifecycle.yaml`
//! - `LIFECYCLE_*` environment overrides
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{API_KEY_VAR, ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{EngineConfig, RetryConfig, ScheduleKind, TagConfig, TransportConfig, WaitConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
