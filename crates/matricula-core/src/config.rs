//! Configuration module for Matricula.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::ports::NotificationPriority;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Matricula.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub transitions: TransitionsConfig,
    pub logging: LoggingConfig,
    pub alerts: AlertsConfig,
}

/// Record store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Seconds to wait on a locked database before failing a write.
    pub busy_timeout_secs: u64,
}

/// Status transition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionsConfig {
    /// How many times a write is retried after a version conflict.
    pub max_conflict_retries: u32,
    /// Record invariant violations in the reconciliation queue.
    pub durable_reconciliation: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

/// Operator alert settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Whether degraded/fatal transitions raise notifications.
    pub enabled: bool,
    /// Notifications below this priority are dropped.
    pub min_priority: NotificationPriority,
}

// ---------------------------------------------------------------------------
// Loading
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
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/matricula/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        base_dir(dirs::config_dir(), dirs::home_dir(), ".config")
            .join("matricula")
            .join("config.yaml")
    }
}

/// Picks the platform directory, else `home/<fallback>`, else the working directory
fn base_dir(platform: Option<PathBuf>, home: Option<PathBuf>, fallback: &str) -> PathBuf {
    platform
        .or_else(|| home.map(|home| home.join(fallback)))
        .unwrap_or_else(|| PathBuf::from("."))
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: base_dir(dirs::data_local_dir(), dirs::home_dir(), ".local/share")
                .join("matricula")
                .join("matricula.db"),
            max_connections: 5,
            busy_timeout_secs: 5,
        }
    }
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 3,
            durable_reconciliation: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_priority: NotificationPriority::High,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"database.max_connections"`.
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

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

/// Upper bound for `transitions.max_conflict_retries`.
const MAX_CONFLICT_RETRIES: u32 = 20;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }
        if self.database.max_connections == 0 {
            errors.push(ValidationError {
                field: "database.max_connections".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- transitions ---
        if self.transitions.max_conflict_retries > MAX_CONFLICT_RETRIES {
            errors.push(ValidationError {
                field: "transitions.max_conflict_retries".into(),
                message: format!("must be at most {MAX_CONFLICT_RETRIES}"),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
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
/// ```rust
/// use matricula_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .database_path(PathBuf::from("/tmp/matricula.db"))
///     .max_conflict_retries(5)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.transitions.max_conflict_retries, 5);
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

    // --- database ---

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    pub fn database_max_connections(mut self, n: u32) -> Self {
        self.config.database.max_connections = n;
        self
    }

    pub fn database_busy_timeout_secs(mut self, secs: u64) -> Self {
        self.config.database.busy_timeout_secs = secs;
        self
    }

    // --- transitions ---

    pub fn max_conflict_retries(mut self, n: u32) -> Self {
        self.config.transitions.max_conflict_retries = n;
        self
    }

    pub fn durable_reconciliation(mut self, enabled: bool) -> Self {
        self.config.transitions.durable_reconciliation = enabled;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- alerts ---

    pub fn alerts_enabled(mut self, enabled: bool) -> Self {
        self.config.alerts.enabled = enabled;
        self
    }

    pub fn alerts_min_priority(mut self, priority: NotificationPriority) -> Self {
        self.config.alerts.min_priority = priority;
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

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = Config::default();
        assert!(cfg.database.path.ends_with("matricula/matricula.db"));
        assert_eq!(cfg.database.max_connections, 5);
        assert_eq!(cfg.database.busy_timeout_secs, 5);
        assert_eq!(cfg.transitions.max_conflict_retries, 3);
        assert!(cfg.transitions.durable_reconciliation);
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, "pretty");
        assert!(cfg.alerts.enabled);
        assert_eq!(cfg.alerts.min_priority, NotificationPriority::High);
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
database:
  path: /tmp/matricula-test.db
  max_connections: 2
  busy_timeout_secs: 10
transitions:
  max_conflict_retries: 7
  durable_reconciliation: false
logging:
  level: debug
  format: json
alerts:
  enabled: false
  min_priority: critical
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).expect("load config");
        assert_eq!(cfg.database.path, PathBuf::from("/tmp/matricula-test.db"));
        assert_eq!(cfg.database.max_connections, 2);
        assert_eq!(cfg.database.busy_timeout_secs, 10);
        assert_eq!(cfg.transitions.max_conflict_retries, 7);
        assert!(!cfg.transitions.durable_reconciliation);
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "json");
        assert!(!cfg.alerts.enabled);
        assert_eq!(cfg.alerts.min_priority, NotificationPriority::Critical);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let yaml = "transitions:\n  max_conflict_retries: 1\n";
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = Config::load(tmp.path()).unwrap();
        assert_eq!(cfg.transitions.max_conflict_retries, 1);
        assert!(cfg.transitions.durable_reconciliation);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn load_or_default_returns_default_on_missing_file() {
        let cfg = Config::load_or_default(Path::new("/nonexistent/config.yaml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"database: [not, a, map").unwrap();
        tmp.flush().unwrap();
        assert!(Config::load(tmp.path()).is_err());
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        let cfg = ConfigBuilder::new().max_conflict_retries(9).build();

        cfg.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), cfg);
    }

    // -- Validation --

    #[test]
    fn validate_catches_zero_max_connections() {
        let cfg = ConfigBuilder::new().database_max_connections(0).build();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "database.max_connections");
    }

    #[test]
    fn validate_catches_excessive_retries() {
        let cfg = ConfigBuilder::new().max_conflict_retries(100).build();
        assert!(cfg
            .validate()
            .iter()
            .any(|e| e.field == "transitions.max_conflict_retries"));
    }

    #[test]
    fn validate_catches_invalid_log_level_and_format() {
        let cfg = ConfigBuilder::new()
            .logging_level("verbose")
            .logging_format("xml")
            .build();
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["logging.level", "logging.format"]);
    }

    #[test]
    fn builder_build_validated_fails_for_invalid_config() {
        let result = ConfigBuilder::new().database_path(PathBuf::new()).build_validated();
        let errors = result.unwrap_err();
        assert_eq!(errors[0].field, "database.path");
    }

    #[test]
    fn default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("matricula/config.yaml"));
    }

    #[test]
    fn base_dir_prefers_platform_dir() {
        let dir = base_dir(
            Some(PathBuf::from("/xdg/config")),
            Some(PathBuf::from("/home/ana")),
            ".config",
        );
        assert_eq!(dir, PathBuf::from("/xdg/config"));
    }

    #[test]
    fn base_dir_falls_back_to_home() {
        let dir = base_dir(None, Some(PathBuf::from("/home/ana")), ".local/share");
        assert_eq!(dir, PathBuf::from("/home/ana/.local/share"));
    }

    #[test]
    fn base_dir_never_yields_tilde() {
        let dir = base_dir(None, None, ".config");
        assert_eq!(dir, PathBuf::from("."));
        assert!(!Config::default_path().starts_with("~"));
        assert!(!DatabaseConfig::default().path.starts_with("~"));
    }

    #[test]
    fn validation_error_display() {
        let err = ValidationError {
            field: "logging.level".into(),
            message: "bad".into(),
        };
        assert_eq!(err.to_string(), "logging.level: bad");
    }
}
