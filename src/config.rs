// Configuration File Support
//
// Service configuration for the limits engine: logging, ceilings, the usage
// store and the status server. TOML format with environment variable
// overrides, loaded from ~/.config/metalimits/config.toml by default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::limits::{FailurePolicy, LimitsConfiguration, ScopeStrategy, SqliteStoreOptions};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Ceilings and enforcement behavior
    pub limits: LimitsConfiguration,

    /// Usage store configuration
    pub store: StoreConfig,

    /// Status server configuration
    pub server: ServerConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// Usage store backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Count rows in a SQLite database
    #[default]
    Sqlite,
    /// Process-local counts, empty at startup
    Memory,
}

/// Usage store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend type
    pub backend: StoreBackend,

    /// Database file (sqlite backend)
    pub database_path: String,

    /// Table and column mapping (sqlite backend)
    #[serde(flatten)]
    pub sqlite: SqliteStoreOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            database_path: "metadata.db".to_string(),
            sqlite: SqliteStoreOptions::default(),
        }
    }
}

/// Status server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Port for the status server
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8586,
        }
    }
}

impl Config {
    /// Load configuration from the default XDG config directory
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    /// If the config file does not exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// fails validation. If the config file does not exist, returns
    /// default configuration.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file from {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file from {:?}", path))?;

        let config = config.apply_env_overrides();
        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Get the default configuration file path
    ///
    /// Returns `~/.config/metalimits/config.toml` on Linux
    pub fn config_path() -> PathBuf {
        if let Some(proj_dirs) =
            directories::ProjectDirs::from("org", "metalimits", "metalimits")
        {
            proj_dirs.config_dir().join("config.toml")
        } else {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home)
                .join(".config")
                .join("metalimits")
                .join("config.toml")
        }
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Environment variables take precedence over config file values:
    /// - METALIMITS_LOG_LEVEL
    /// - METALIMITS_LOG_FORMAT
    /// - METALIMITS_LIMITS_ENABLED
    /// - METALIMITS_FAILURE_POLICY (fail_closed | fail_open)
    /// - METALIMITS_DATABASE_PATH
    /// - METALIMITS_PORT
    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = var("METALIMITS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("METALIMITS_LOG_FORMAT") {
            self.logging.format = format;
        }

        if let Some(enabled) = var("METALIMITS_LIMITS_ENABLED") {
            self.limits.enabled = enabled.parse().unwrap_or(self.limits.enabled);
        }
        if let Some(policy) = var("METALIMITS_FAILURE_POLICY") {
            match policy.to_lowercase().as_str() {
                "fail_closed" => self.limits.failure_policy = FailurePolicy::FailClosed,
                "fail_open" => self.limits.failure_policy = FailurePolicy::FailOpen,
                other => tracing::warn!("Ignoring unknown failure policy {:?}", other),
            }
        }

        if let Some(path) = var("METALIMITS_DATABASE_PATH") {
            self.store.database_path = path;
        }
        if let Some(port) = var("METALIMITS_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }

        self
    }

    /// Validate the configuration
    ///
    /// Ceiling values are checked by `LimitsEngine::init`; this covers the
    /// surrounding service settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        if self.store.backend == StoreBackend::Sqlite {
            if self.store.database_path.is_empty() {
                anyhow::bail!("Store database_path must be set for the sqlite backend");
            }
            self.store
                .sqlite
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid store mapping: {}", e))?;
            if self.limits.scope == ScopeStrategy::PerTenant
                && self.store.sqlite.tenant_column.is_none()
            {
                anyhow::bail!(
                    "per_tenant scope requires store.tenant_column for the sqlite backend"
                );
            }
        }

        if self.server.port == 0 {
            anyhow::bail!("Server port must be > 0");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{CategoryLimit, OperationKind, ResourceCategory};
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
        assert_eq!(config.store.database_path, "metadata.db");
        assert_eq!(config.server.port, 8586);
        assert!(config.limits.enabled);
        assert!(config.limits.categories.is_empty());
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_per_tenant_needs_tenant_column() {
        let mut config = Config::default();
        config.limits.scope = ScopeStrategy::PerTenant;
        assert!(config.validate().is_err());

        config.store.sqlite.tenant_column = Some("tenant_id".to_string());
        assert!(config.validate().is_ok());

        // The memory backend partitions by tenant natively
        config.store.sqlite.tenant_column = None;
        config.store.backend = StoreBackend::Memory;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_unsafe_table_name() {
        let mut config = Config::default();
        config
            .store
            .sqlite
            .tables
            .insert(ResourceCategory::Table, "tables; --".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension(".nonexistent");
        let config = Config::load_from_path(&path);
        assert!(config.is_ok());
        assert_eq!(config.unwrap(), Config::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[limits]
scope = "per_tenant"
failure_policy = "fail_open"
store_timeout_ms = 500
exempt_principals = ["ingestion-bot"]

[limits.categories.table]
max_count = 5

[limits.categories.user]
max_count = -1

[limits.categories.ingestion_pipeline]
max_count = 10
enforced_operations = ["create", "ingest"]

[store]
backend = "sqlite"
database_path = "/var/lib/metadata/openmetadata.db"
tenant_column = "tenant_id"

[store.tables]
user = "users"

[server]
host = "0.0.0.0"
port = 9000
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.limits.scope, ScopeStrategy::PerTenant);
        assert_eq!(config.limits.failure_policy, FailurePolicy::FailOpen);
        assert_eq!(config.limits.store_timeout_ms, 500);
        assert_eq!(config.limits.categories.len(), 3);
        assert_eq!(
            config.limits.categories[&ResourceCategory::IngestionPipeline],
            CategoryLimit::new(10).gating([OperationKind::Create, OperationKind::Ingest])
        );
        assert_eq!(config.store.database_path, "/var/lib/metadata/openmetadata.db");
        assert_eq!(config.store.sqlite.tenant_column.as_deref(), Some("tenant_id"));
        assert_eq!(config.store.sqlite.soft_delete_column.as_deref(), Some("deleted"));
        assert_eq!(config.store.sqlite.table_for(ResourceCategory::User), "users");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging
level = "debug"
"#; // Invalid TOML

        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path());
        assert!(config.is_err());
    }

    #[test]
    fn test_load_unknown_category_fails() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(
            temp_file.path(),
            "[limits.categories.spaceship]\nmax_count = 3\n",
        )
        .unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().apply_overrides_from(overrides(&[
            ("METALIMITS_LOG_LEVEL", "debug"),
            ("METALIMITS_LOG_FORMAT", "json"),
            ("METALIMITS_LIMITS_ENABLED", "false"),
            ("METALIMITS_FAILURE_POLICY", "fail_open"),
            ("METALIMITS_DATABASE_PATH", "/tmp/om.db"),
            ("METALIMITS_PORT", "9100"),
        ]));

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert!(!config.limits.enabled);
        assert_eq!(config.limits.failure_policy, FailurePolicy::FailOpen);
        assert_eq!(config.store.database_path, "/tmp/om.db");
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let config = Config::default().apply_overrides_from(overrides(&[
            ("METALIMITS_LIMITS_ENABLED", "maybe"),
            ("METALIMITS_FAILURE_POLICY", "fail_sideways"),
            ("METALIMITS_PORT", "99999"),
        ]));

        // Should keep defaults for invalid values
        assert!(config.limits.enabled);
        assert_eq!(config.limits.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.server.port, 8586);
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.ends_with("config.toml"));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);

        config.logging.level = "WARN".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::WARN);
    }

    #[test]
    fn test_log_level_parsing_invalid() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_config_partial_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging]\nlevel = \"debug\"\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.port, 8586);
        assert_eq!(config.store.backend, StoreBackend::Sqlite);
    }
}
