//! Configuration parser for loading engine configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, the YAML
//! file, then `LIFECYCLE_*` environment variables (a `.env` file is loaded
//! into the environment first when present).

use crate::error::{ConfigError, EngineError, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

use super::spec::{EngineConfig, ScheduleKind};

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "LIFECYCLE_API_KEY";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory searched for `.env`.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or invalid YAML.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<EngineConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(EngineError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string. Blank input is the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<EngineConfig> {
        debug!("Parsing YAML configuration");
        if content.trim().is_empty() {
            return Ok(EngineConfig::default());
        }

        serde_yaml::from_str(content).map_err(|e| {
            EngineError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })
    }

    /// Loads a file, or the defaults when `path` is `None`, then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded or an override cannot be
    /// parsed.
    pub fn load_with_env(&self, path: Option<&Path>) -> Result<EngineConfig> {
        let mut config = match path {
            Some(path) => self.load_file(path)?,
            None => EngineConfig::default(),
        };
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Applies `LIFECYCLE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEnvVar` for values of the wrong type.
    pub fn apply_env_overrides(
        config: &mut EngineConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(endpoint) = lookup("LIFECYCLE_ENDPOINT") {
            debug!("Overriding transport.endpoint from environment");
            config.transport.endpoint = Some(endpoint);
        }
        if let Some(key) = lookup(API_KEY_VAR) {
            debug!("Overriding transport.api_key from environment");
            config.transport.api_key = Some(key);
        }
        if let Some(value) = lookup("LIFECYCLE_REQUEST_TIMEOUT_SECS") {
            config.transport.request_timeout_secs = parse_var("LIFECYCLE_REQUEST_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("LIFECYCLE_CREATE_TIMEOUT_SECS") {
            config.waits.create_timeout_secs = Some(parse_var("LIFECYCLE_CREATE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("LIFECYCLE_UPDATE_TIMEOUT_SECS") {
            config.waits.update_timeout_secs = Some(parse_var("LIFECYCLE_UPDATE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("LIFECYCLE_DELETE_TIMEOUT_SECS") {
            config.waits.delete_timeout_secs = Some(parse_var("LIFECYCLE_DELETE_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("LIFECYCLE_POLL_INTERVAL_SECS") {
            config.waits.poll_interval_secs = parse_var("LIFECYCLE_POLL_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = lookup("LIFECYCLE_POLL_SCHEDULE") {
            config.waits.schedule = match value.to_ascii_lowercase().as_str() {
                "fixed" => ScheduleKind::Fixed,
                "fibonacci" => ScheduleKind::Fibonacci,
                _ => return Err(invalid_var("LIFECYCLE_POLL_SCHEDULE", &value)),
            };
        }
        if let Some(value) = lookup("LIFECYCLE_MAX_ATTEMPTS") {
            config.retry.max_attempts = parse_var("LIFECYCLE_MAX_ATTEMPTS", &value)?;
        }
        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                EngineError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid_var(name, value))
}

fn invalid_var(name: &str, value: &str) -> EngineError {
    EngineError::Config(ConfigError::InvalidEnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["lifecycle.yaml", "lifecycle.yml", ".lifecycle.yaml"];

/// Finds the configuration file in `start_dir` or its parents.
///
/// # Errors
///
/// Returns `FileNotFound` if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(EngineError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn test_parse_partial_config() {
        let yaml = r"
waits:
  delete_timeout_secs: 900
  schedule: fibonacci
  poll_interval_secs: 1
transport:
  endpoint: https://api.example.com
retry:
  max_attempts: 5
tags:
  ignored_keys: [LastSeen]
";
        let config = ConfigParser::new().parse_yaml(yaml, None).unwrap();

        assert_eq!(config.waits.delete_timeout_secs, Some(900));
        assert_eq!(config.waits.schedule, ScheduleKind::Fibonacci);
        assert_eq!(config.waits.max_poll_interval_secs, 60);
        assert_eq!(config.transport.endpoint.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.transport.request_timeout_secs, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.tags.ignored_keys, vec![String::from("LastSeen")]);
    }

    #[test]
    fn test_blank_file_is_default() {
        let config = ConfigParser::new().parse_yaml("  \n", None).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = ConfigParser::new().parse_yaml("waits: [", None).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let vars = HashMap::from([
            ("LIFECYCLE_ENDPOINT", "http://localhost:8080"),
            ("LIFECYCLE_API_KEY", "secret"),
            ("LIFECYCLE_CREATE_TIMEOUT_SECS", "300"),
            ("LIFECYCLE_POLL_SCHEDULE", "Fibonacci"),
        ]);
        let mut config = EngineConfig::default();
        ConfigParser::apply_env_overrides(&mut config, |name| vars.get(name).map(|v| (*v).to_string()))
            .unwrap();

        assert_eq!(config.transport.endpoint.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.transport.api_key.as_deref(), Some("secret"));
        assert_eq!(config.waits.create_timeout_secs, Some(300));
        assert_eq!(config.waits.schedule, ScheduleKind::Fibonacci);
        assert_eq!(
            crate::reconciler::WaitOverrides::from(&config.waits).create_timeout,
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = EngineConfig::default();
        let err = ConfigParser::apply_env_overrides(&mut config, |name| {
            (name == "LIFECYCLE_MAX_ATTEMPTS").then(|| String::from("many"))
        })
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::InvalidEnvVar { ref name, .. }) if name == "LIFECYCLE_MAX_ATTEMPTS"
        ));
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lifecycle.yaml"), "{}").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("lifecycle.yaml"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigParser::new().load_file(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::FileNotFound { .. })));
    }
}
