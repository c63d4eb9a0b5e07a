//! Node configuration types

use neon_auth::GatewayConfig;
use neon_core::constants::{INIT_DATA_MAX_AGE_SECS, SESSION_TTL_SECS};
use neon_economics::{EconomyConfig, EconomyConfigError, LeaderboardConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Invalid economy settings: {0}")]
    Economy(#[from] EconomyConfigError),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Complete node configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Session gateway
    #[serde(default)]
    pub auth: AuthSettings,

    /// Economy parameters and catalogs
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Leaderboard settings
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,

    /// Ledger storage
    #[serde(default)]
    pub storage: StorageSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl NodeConfig {
    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.economy.validate()?;
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.request_timeout_secs must be positive".to_string(),
            ));
        }
        if self.auth.session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "auth.session_ttl_secs must be positive".to_string(),
            ));
        }
        if self.leaderboard.limit == 0 {
            return Err(ConfigError::Invalid(
                "leaderboard.limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// TOML rendering with the bot token masked
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.auth.bot_token.is_some() {
            shown.auth.bot_token = Some("<redacted>".to_string());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

/// HTTP server settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins (`*` allows any)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Session gateway settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Telegram bot token; unset disables signature checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Maximum launch data age
    #[serde(default = "default_init_data_max_age_secs")]
    pub init_data_max_age_secs: i64,

    /// Session lifetime
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,

    /// Serve credential-less requests as the shared guest player
    #[serde(default)]
    pub guest_mode: bool,

    /// How often expired sessions are purged (0 disables)
    #[serde(default = "default_session_purge_interval_secs")]
    pub session_purge_interval_secs: u64,
}

fn default_init_data_max_age_secs() -> i64 {
    INIT_DATA_MAX_AGE_SECS
}

fn default_session_ttl_secs() -> i64 {
    SESSION_TTL_SECS
}

fn default_session_purge_interval_secs() -> u64 {
    3600
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            init_data_max_age_secs: default_init_data_max_age_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            guest_mode: false,
            session_purge_interval_secs: default_session_purge_interval_secs(),
        }
    }
}

impl AuthSettings {
    pub fn session_purge_interval(&self) -> Option<Duration> {
        (self.session_purge_interval_secs > 0)
            .then(|| Duration::from_secs(self.session_purge_interval_secs))
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            bot_token: self.bot_token.clone(),
            init_data_max_age_secs: self.init_data_max_age_secs,
            session_ttl_secs: self.session_ttl_secs,
            guest_mode: self.guest_mode,
        }
    }
}

/// Storage backend
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Volatile, lost on restart
    Memory,
    #[default]
    Sqlite,
}

/// Ledger storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite database file
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "./data/neon.sqlite".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_storage_path(),
        }
    }
}

/// Log output format
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Metrics configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Serve `/metrics`
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: NodeConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.server.request_timeout_secs, 5);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.leaderboard.limit, 20);
        assert!(config.leaderboard.mask_user_ids);
        assert!(!config.auth.guest_mode);
        assert_eq!(
            config.auth.session_purge_interval(),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(config.economy.producers.len(), 25);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections() {
        let config: NodeConfig = toml::from_str(
            r#"
            [server]
            listen_addr = "127.0.0.1:9000"

            [economy]
            growth = 1.15
            initial_score = 100

            [leaderboard]
            cache_ttl_secs = 0

            [logging]
            format = "json"

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.server.request_timeout_secs, 5);
        assert!((config.economy.growth - 1.15).abs() < f64::EPSILON);
        assert_eq!(config.economy.initial_score, 100);
        assert_eq!(config.economy.power_price_increment, 10);
        assert_eq!(config.leaderboard.cache_ttl_secs, 0);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_custom_catalog() {
        let config: NodeConfig = toml::from_str(
            r#"
            [[economy.producers]]
            id = 1
            name = "Spark"
            emoji = "✨"
            base_cost = 5
            rate = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.economy.producers.len(), 1);
        assert_eq!(config.economy.goals.len(), 6);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = NodeConfig::default();
        config.economy.growth = 0.5;
        assert!(matches!(config.validate(), Err(ConfigError::Economy(_))));

        let mut config = NodeConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_from_file_and_redaction() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[auth]\nbot_token = \"123:SECRET\"\nguest_mode = true").unwrap();

        let config = NodeConfig::from_file(file.path()).unwrap();
        assert!(config.auth.guest_mode);
        assert_eq!(config.auth.gateway_config().bot_token.as_deref(), Some("123:SECRET"));

        let rendered = config.to_redacted_toml().unwrap();
        assert!(!rendered.contains("SECRET"));
        assert!(rendered.contains("<redacted>"));

        let reparsed: NodeConfig = toml::from_str(&rendered).unwrap();
        assert!(reparsed.auth.guest_mode);
    }
}
