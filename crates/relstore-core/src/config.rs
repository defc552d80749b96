//! Configuration module for relstore.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default first reconnect wait, in milliseconds.
pub const DEFAULT_MIN_WAIT_MS: u64 = 16;

/// Default reconnect wait ceiling, in milliseconds.
pub const DEFAULT_MAX_WAIT_MS: u64 = 5000;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for relstore.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub connection: ConnectionConfig,
    pub reconnect: ReconnectConfig,
    pub logging: LoggingConfig,
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Driver name; `sqlite` is built in.
    pub driver: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    /// Schema used for catalog lookups and to qualify table names.
    pub schema: Option<String>,
    /// Database file or URL for file-based engines.
    pub database: Option<String>,
}

/// Reconnect backoff settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// First wait after a lost connection (milliseconds).
    pub min_wait_ms: u64,
    /// Ceiling the doubling wait is held at (milliseconds).
    pub max_wait_ms: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/relstore/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("relstore")
            .join("config.yaml")
    }
}

impl ReconnectConfig {
    pub fn min_wait(&self) -> Duration {
        Duration::from_millis(self.min_wait_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ConnectionConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("relstore");
        Self {
            driver: "sqlite".to_string(),
            host: "localhost".to_string(),
            port: 0,
            user: String::new(),
            password: None,
            schema: None,
            database: Some(data_dir.join("relstore.db").to_string_lossy().into_owned()),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_wait_ms: DEFAULT_MIN_WAIT_MS,
            max_wait_ms: DEFAULT_MAX_WAIT_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"reconnect.min_wait_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Drivers addressed by a database locator instead of host and port.
const FILE_DRIVERS: &[&str] = &["sqlite"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- connection ---
        let driver = self.connection.driver.trim();
        if driver.is_empty() {
            errors.push(ValidationError {
                field: "connection.driver".into(),
                message: "must not be empty".into(),
            });
        } else if FILE_DRIVERS.contains(&driver) {
            let missing = self
                .connection
                .database
                .as_deref()
                .map(|d| d.trim().is_empty())
                .unwrap_or(true);
            if missing {
                errors.push(ValidationError {
                    field: "connection.database".into(),
                    message: format!("required for the {} driver", driver),
                });
            }
        } else {
            if self.connection.host.trim().is_empty() {
                errors.push(ValidationError {
                    field: "connection.host".into(),
                    message: "must not be empty".into(),
                });
            }
            if self.connection.port == 0 {
                errors.push(ValidationError {
                    field: "connection.port".into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        // --- reconnect ---
        if self.reconnect.min_wait_ms == 0 {
            errors.push(ValidationError {
                field: "reconnect.min_wait_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.reconnect.max_wait_ms < self.reconnect.min_wait_ms {
            errors.push(ValidationError {
                field: "reconnect.max_wait_ms".into(),
                message: format!(
                    "max_wait_ms ({}) must not be less than min_wait_ms ({})",
                    self.reconnect.max_wait_ms, self.reconnect.min_wait_ms
                ),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use relstore_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .connection_database("sqlite::memory:")
///     .connection_schema("main")
///     .reconnect_max_wait_ms(2000)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- connection ---

    pub fn connection_driver(mut self, driver: impl Into<String>) -> Self {
        self.config.connection.driver = driver.into();
        self
    }

    pub fn connection_host(mut self, host: impl Into<String>) -> Self {
        self.config.connection.host = host.into();
        self
    }

    pub fn connection_port(mut self, port: u16) -> Self {
        self.config.connection.port = port;
        self
    }

    pub fn connection_user(mut self, user: impl Into<String>) -> Self {
        self.config.connection.user = user.into();
        self
    }

    pub fn connection_password(mut self, password: impl Into<String>) -> Self {
        self.config.connection.password = Some(password.into());
        self
    }

    pub fn connection_schema(mut self, schema: impl Into<String>) -> Self {
        self.config.connection.schema = Some(schema.into());
        self
    }

    pub fn connection_database(mut self, database: impl Into<String>) -> Self {
        self.config.connection.database = Some(database.into());
        self
    }

    // --- reconnect ---

    pub fn reconnect_min_wait_ms(mut self, ms: u64) -> Self {
        self.config.reconnect.min_wait_ms = ms;
        self
    }

    pub fn reconnect_max_wait_ms(mut self, ms: u64) -> Self {
        self.config.reconnect.max_wait_ms = ms;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert_eq!(cfg.connection.driver, "sqlite");
        assert!(cfg
            .connection
            .database
            .as_deref()
            .unwrap()
            .ends_with("relstore.db"));
        assert_eq!(cfg.reconnect.min_wait_ms, 16);
        assert_eq!(cfg.reconnect.max_wait_ms, 5000);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_passes_validation() {
        let errors = Config::default().validate();
        assert!(errors.is_empty(), "unexpected validation errors: {errors:?}");
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file() {
        let yaml = r#"
connection:
  driver: hana
  host: db.example.com
  port: 30015
  user: SYSTEM
  password: secret
  schema: APP
reconnect:
  min_wait_ms: 32
  max_wait_ms: 8000
logging:
  level: debug
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.connection.driver, "hana");
        assert_eq!(cfg.connection.host, "db.example.com");
        assert_eq!(cfg.connection.port, 30015);
        assert_eq!(cfg.connection.user, "SYSTEM");
        assert_eq!(cfg.connection.password.as_deref(), Some("secret"));
        assert_eq!(cfg.connection.schema.as_deref(), Some("APP"));
        assert_eq!(cfg.reconnect.min_wait(), Duration::from_millis(32));
        assert_eq!(cfg.reconnect.max_wait(), Duration::from_millis(8000));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"connection:\n  database: /tmp/store.db\n")
            .unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.connection.driver, "sqlite");
        assert_eq!(cfg.connection.database.as_deref(), Some("/tmp/store.db"));
        assert_eq!(cfg.reconnect, ReconnectConfig::default());
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg.reconnect.min_wait_ms, 16);
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(Config::load(tmp.path()).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_requires_database_for_sqlite() {
        let mut cfg = Config::default();
        cfg.connection.database = None;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "connection.database"));
    }

    #[test]
    fn validate_requires_host_and_port_for_network_drivers() {
        let cfg = ConfigBuilder::new()
            .connection_driver("hana")
            .connection_host("")
            .build();
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"connection.host".to_string()));
        assert!(fields.contains(&"connection.port".to_string()));
    }

    #[test]
    fn validate_catches_bad_backoff_window() {
        let mut cfg = Config::default();
        cfg.reconnect.min_wait_ms = 0;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "reconnect.min_wait_ms"));

        let mut cfg = Config::default();
        cfg.reconnect.min_wait_ms = 100;
        cfg.reconnect.max_wait_ms = 50;
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "reconnect.max_wait_ms"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let cfg = ConfigBuilder::new().logging_level("verbose").build();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "logging.level");
        assert!(errors[0].to_string().contains("verbose"));
    }

    // -- Builder --

    #[test]
    fn builder_overrides_and_validates() {
        let cfg = ConfigBuilder::new()
            .connection_database("sqlite::memory:")
            .connection_schema("main")
            .connection_user("app")
            .connection_password("pw")
            .reconnect_min_wait_ms(10)
            .reconnect_max_wait_ms(100)
            .build_validated()
            .expect("valid config");
        assert_eq!(cfg.connection.schema.as_deref(), Some("main"));
        assert_eq!(cfg.reconnect.max_wait_ms, 100);

        let result = ConfigBuilder::new().reconnect_min_wait_ms(0).build_validated();
        assert!(result.is_err());
    }
}
