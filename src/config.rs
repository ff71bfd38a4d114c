//! Application configuration
//!
//! Loaded from a TOML file (default `~/.config/swap-service/config.toml`).
//! Every section and field has a default, so a partial file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::errors::InfraError;

/// Environment variable overriding the config file location
pub const CONFIG_ENV_VAR: &str = "SWAP_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub reconciliation: ReconciliationConfig,
    pub outbound: OutboundConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SeaORM connection URL. Empty means a SQLite file next to the config.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
        }
    }
}

impl DatabaseSettings {
    pub fn connection_url(&self) -> String {
        if !self.url.trim().is_empty() {
            return self.url.clone();
        }
        let path = config_dir().join("swap-service.db");
        format!("sqlite://{}?mode=rwc", path.display())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "plain" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// sha256 hex digests of operator API keys. Empty disables the check.
    pub api_key_hashes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    pub expiry_interval_secs: u64,
    pub stuck_check_interval_secs: u64,
    /// 0 runs the overdue sweep on demand only
    pub overdue_check_interval_secs: u64,
    pub stuck_threshold_minutes: i64,
    pub batch_size: u64,
    /// Cancel bookings still open `overdue_grace_minutes` after their slot
    pub auto_cancel_overdue: bool,
    pub overdue_grace_minutes: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            expiry_interval_secs: 86_400,
            stuck_check_interval_secs: 3_600,
            overdue_check_interval_secs: 0,
            stuck_threshold_minutes: 120,
            batch_size: 500,
            auto_cancel_overdue: false,
            overdue_grace_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 200,
            max_delay_ms: 10_000,
        }
    }
}

impl OutboundConfig {
    pub fn retry_config(&self) -> crate::shared::RetryConfig {
        crate::shared::RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: std::time::Duration::from_millis(self.initial_delay_ms),
            backoff_multiplier: 2.0,
            max_delay: std::time::Duration::from_millis(self.max_delay_ms),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| InfraError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, InfraError> {
        toml::from_str(raw).map_err(|e| InfraError::Config(e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), InfraError> {
        let raw = toml::to_string_pretty(self).map_err(|e| InfraError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| InfraError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, raw).map_err(|e| InfraError::Config(format!("{}: {}", path.display(), e)))
    }
}

fn config_dir() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("swap-service")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// `SWAP_CONFIG` if set, otherwise the default path.
pub fn config_path_from_env() -> PathBuf {
    std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| default_config_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_fills_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [server]
            api_port = 9090

            [reconciliation]
            auto_cancel_overdue = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.api_port, 9090);
        assert_eq!(cfg.server.api_host, "0.0.0.0");
        assert!(cfg.reconciliation.auto_cancel_overdue);
        assert_eq!(cfg.reconciliation.stuck_threshold_minutes, 120);
        assert_eq!(cfg.reconciliation.batch_size, 500);
        assert!(cfg.security.api_key_hashes.is_empty());
    }

    #[test]
    fn explicit_database_url_wins() {
        let mut db = DatabaseSettings::default();
        assert!(db.connection_url().starts_with("sqlite://"));
        db.url = "sqlite::memory:".into();
        assert_eq!(db.connection_url(), "sqlite::memory:");
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = AppConfig::from_toml("[server\napi_port = ").unwrap_err();
        assert!(matches!(err, InfraError::Config(_)));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = std::env::temp_dir().join(format!("swap-service-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.outbound.max_attempts = 9;
        cfg.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.outbound.max_attempts, 9);
        let _ = std::fs::remove_dir_all(dir);
    }
}
