//! # Gateway Configuration
//!
//! Configuration for the gateway process: where the database lives, how hard
//! to retry, and where to listen.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     PARKING_DB_PATH=/var/lib/parking/parking.db                        │
//! │     PARKING_BIND_ADDR=0.0.0.0:8080                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/parking-engine/gateway.toml (Linux)                      │
//! │     ~/Library/Application Support/com.parking.engine/gateway.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # gateway.toml
//! [database]
//! path = "./parking.db"
//! max_connections = 8
//! busy_timeout_ms = 5000
//!
//! [retry]
//! max_attempts = 3
//! initial_interval_ms = 25
//! max_interval_ms = 500
//! multiplier = 2.0
//! randomization_factor = 0.5
//!
//! [server]
//! bind_addr = "127.0.0.1:8080"
//! request_timeout_ms = 5000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use parking_db::DbConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{GatewayError, GatewayResult};

// =============================================================================
// Database Section
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a writer waits on a locked database before reporting busy.
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./parking.db")
}

fn default_max_connections() -> u32 {
    8
}

fn default_busy_timeout() -> u64 {
    5_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl DatabaseSettings {
    /// Builds the pool configuration for these settings.
    pub fn db_config(&self) -> DbConfig {
        if self.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory();
        }

        DbConfig::new(&self.path)
            .max_connections(self.max_connections)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

// =============================================================================
// Retry Section
// =============================================================================

/// `[retry]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per request, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,

    #[serde(default = "default_max_interval")]
    pub max_interval_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter: each wait is drawn from `interval * (1 ± factor)`.
    #[serde(default = "default_randomization_factor")]
    pub randomization_factor: f64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_interval() -> u64 {
    25
}
fn default_max_interval() -> u64 {
    500
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_randomization_factor() -> f64 {
    0.5
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            max_attempts: default_max_attempts(),
            initial_interval_ms: default_initial_interval(),
            max_interval_ms: default_max_interval(),
            multiplier: default_multiplier(),
            randomization_factor: default_randomization_factor(),
        }
    }
}

// =============================================================================
// Server Section
// =============================================================================

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deadline for one request, all retries included.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_request_timeout() -> u64 {
    5_000
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ServerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// =============================================================================
// Gateway Config
// =============================================================================

/// Complete gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub server: ServerSettings,
}

impl GatewayConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (gateway.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> GatewayResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading gateway config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> GatewayResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(GatewayError::InvalidConfig(
                "database.path must not be empty".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(GatewayError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        let retry = &self.retry;
        if retry.max_attempts == 0 {
            return Err(GatewayError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }

        if retry.initial_interval_ms > retry.max_interval_ms {
            return Err(GatewayError::InvalidConfig(format!(
                "retry.initial_interval_ms ({}) exceeds retry.max_interval_ms ({})",
                retry.initial_interval_ms, retry.max_interval_ms
            )));
        }

        if retry.multiplier < 1.0 {
            return Err(GatewayError::InvalidConfig(
                "retry.multiplier must be at least 1.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&retry.randomization_factor) {
            return Err(GatewayError::InvalidConfig(
                "retry.randomization_factor must be between 0.0 and 1.0".into(),
            ));
        }

        if self.server.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(GatewayError::InvalidConfig(format!(
                "server.bind_addr is not a socket address: {}",
                self.server.bind_addr
            )));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(GatewayError::InvalidConfig(
                "server.request_timeout_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PARKING_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(addr) = std::env::var("PARKING_BIND_ADDR") {
            debug!(addr = %addr, "Overriding bind address from environment");
            self.server.bind_addr = addr;
        }

        if let Ok(attempts) = std::env::var("PARKING_MAX_ATTEMPTS") {
            match attempts.parse::<u32>() {
                Ok(n) => self.retry.max_attempts = n,
                Err(_) => warn!(value = %attempts, "Ignoring invalid PARKING_MAX_ATTEMPTS"),
            }
        }

        if let Ok(timeout) = std::env::var("PARKING_REQUEST_TIMEOUT_MS") {
            match timeout.parse::<u64>() {
                Ok(ms) => self.server.request_timeout_ms = ms,
                Err(_) => warn!(value = %timeout, "Ignoring invalid PARKING_REQUEST_TIMEOUT_MS"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "parking", "engine")
            .map(|dirs| dirs.config_dir().join("gateway.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_interval_ms, 25);
        assert_eq!(config.retry.max_interval_ms, 500);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [retry]
            max_attempts = 5

            [server]
            bind_addr = "0.0.0.0:9000"
        "#;

        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.multiplier, 2.0);
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.database.path, PathBuf::from("./parking.db"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = GatewayConfig::default();
        config.retry.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validate_rejects_bad_bind_addr() {
        let mut config = GatewayConfig::default();
        config.server.bind_addr = "not-an-address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_intervals() {
        let mut config = GatewayConfig::default();
        config.retry.initial_interval_ms = 1_000;
        config.retry.max_interval_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_reads_file_sections() {
        let path = std::env::temp_dir().join(format!(
            "parking-gateway-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            "[database]\npath = \"/tmp/lot.db\"\n\n[server]\nrequest_timeout_ms = 1500\n",
        )
        .unwrap();

        let loaded = GatewayConfig::load(Some(path.clone()));
        std::fs::remove_file(&path).ok();

        let loaded = loaded.unwrap();
        if std::env::var_os("PARKING_DB_PATH").is_none() {
            assert_eq!(loaded.database.path, PathBuf::from("/tmp/lot.db"));
        }
        assert_eq!(loaded.server.request_timeout(), Duration::from_millis(1_500));
        assert_eq!(loaded.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let path = std::env::temp_dir().join(format!(
            "parking-gateway-{}.toml",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(&path, "[retry]\nmultiplier = 0.5\n").unwrap();

        let err = GatewayConfig::load(Some(path.clone())).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, GatewayError::InvalidConfig(_)));
    }

    #[test]
    fn test_memory_path_builds_in_memory_pool() {
        let mut settings = DatabaseSettings::default();
        settings.path = PathBuf::from(":memory:");
        assert!(settings.db_config().is_in_memory());
    }
}
