//! Service configuration.
//!
//! Every key is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! [esp]
//! endpoint = "http://192.168.1.100/read"
//! timeout = 5
//!
//! [database]
//! backend = "sqlite"        # or "mysql"
//! path = "/var/lib/plantwatch/readings.db"
//! host = "localhost"        # mysql only
//! name = "plantwatch"       # mysql only
//! port = 3306               # mysql only
//!
//! [api]
//! host = "0.0.0.0"
//! port = 5000
//!
//! [service]
//! interval_seconds = 300
//!
//! [logging]
//! level = "info"
//! file = "/var/log/plantwatch.log"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use plantwatch_store::MySqlTarget;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::collector::StorageTarget;
use crate::secrets::DatabaseCredentials;

/// Service configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device connection settings.
    pub esp: EspConfig,
    /// Which store receives readings.
    pub database: DatabaseConfig,
    /// Gateway settings.
    pub api: ApiConfig,
    /// Collector loop settings.
    pub service: ServiceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Storage backend selected by `database.backend`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// Local SQLite file at `database.path`.
    #[default]
    Sqlite,
    /// MySQL server at `database.host`/`database.port`, schema `database.name`.
    Mysql,
}

/// Storage settings.
///
/// `path` applies to the `sqlite` backend; `host`, `name` and `port` apply to
/// the `mysql` backend, whose credentials come from `DB_USER`/`DB_PASSWORD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    /// SQLite database file.
    pub path: PathBuf,
    pub host: String,
    /// MySQL database (schema) name.
    pub name: String,
    pub port: u16,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::default(),
            path: plantwatch_store::default_db_path(),
            host: "localhost".to_string(),
            name: "plantwatch".to_string(),
            port: 3306,
        }
    }
}

impl DatabaseConfig {
    /// Where the collector writes, with `credentials` for the `mysql` backend.
    pub fn target(&self, credentials: &DatabaseCredentials) -> StorageTarget {
        match self.backend {
            DatabaseBackend::Sqlite => StorageTarget::Sqlite(self.path.clone()),
            DatabaseBackend::Mysql => StorageTarget::MySql(MySqlTarget::new(
                &self.host,
                self.port,
                &self.name,
                credentials.user.as_deref(),
                credentials.password.as_deref(),
            )),
        }
    }

    /// Only the keys of the selected backend are checked.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match self.backend {
            DatabaseBackend::Sqlite => {
                if self.path.as_os_str().is_empty() {
                    errors.push(ValidationError::new(
                        "database.path",
                        "database path cannot be empty",
                    ));
                }
            }
            DatabaseBackend::Mysql => {
                if self.host.trim().is_empty() {
                    errors.push(ValidationError::new(
                        "database.host",
                        "database host cannot be empty",
                    ));
                }
                if self.name.trim().is_empty() {
                    errors.push(ValidationError::new(
                        "database.name",
                        "database name cannot be empty",
                    ));
                }
                if self.port == 0 {
                    errors.push(ValidationError::new(
                        "database.port",
                        "port cannot be 0",
                    ));
                }
            }
        }

        errors
    }
}

impl Config {
    /// Load configuration from the default path, or defaults if it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return all errors at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        errors.extend(self.esp.validate());
        errors.extend(self.database.validate());
        errors.extend(self.api.validate());
        errors.extend(self.service.validate());
        errors.extend(self.logging.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

/// Device connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EspConfig {
    /// URL that returns the current reading. Action URLs are derived from it.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for EspConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://192.168.1.100/read".to_string(),
            timeout: 5,
        }
    }
}

impl EspConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.endpoint.is_empty() {
            errors.push(ValidationError::new(
                "esp.endpoint",
                "endpoint cannot be empty",
            ));
        } else if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://")
        {
            errors.push(ValidationError::new(
                "esp.endpoint",
                format!(
                    "endpoint must start with http:// or https://, got '{}'",
                    self.endpoint
                ),
            ));
        }

        if self.timeout == 0 {
            errors.push(ValidationError::new("esp.timeout", "timeout cannot be 0"));
        }

        errors
    }
}

/// Gateway settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ApiConfig {
    /// `host:port`, as shown to users.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.host.trim().is_empty() {
            errors.push(ValidationError::new("api.host", "host cannot be empty"));
        }
        if self.port == 0 {
            errors.push(ValidationError::new("api.port", "port cannot be 0"));
        }

        errors
    }
}

/// Collector loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Sleep between collector cycles, in seconds.
    pub interval_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 300,
        }
    }
}

impl ServiceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        if self.interval_seconds == 0 {
            vec![ValidationError::new(
                "service.interval_seconds",
                "interval cannot be 0",
            )]
        } else {
            Vec::new()
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: trace, debug, info, warning, error (case-insensitive).
    pub level: String,
    /// Optional file that receives a copy of every log line.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Parse `level` into a tracing filter.
    ///
    /// Also accepts the names `warning` and `critical`.
    pub fn level_filter(&self) -> Option<LevelFilter> {
        match self.level.to_ascii_lowercase().as_str() {
            "warning" => Some(LevelFilter::WARN),
            "critical" | "fatal" => Some(LevelFilter::ERROR),
            other => other.parse().ok(),
        }
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        if self.level_filter().is_none() {
            vec![ValidationError::new(
                "logging.level",
                format!("unknown log level '{}'", self.level),
            )]
        } else {
            Vec::new()
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The dotted key (e.g., `esp.endpoint`).
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("plantwatch")
        .join("config.toml")
}
