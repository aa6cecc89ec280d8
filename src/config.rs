//! Configuration system.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `drkey.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `DRKEY_SCIOND_ADDR` - Key daemon address used by the client side
//! - `DRKEY_REQUEST_TIMEOUT_SECS` - Deadline for a single daemon request
//! - `DRKEY_SERVER_HOST` - Bind address of the reference daemon
//! - `DRKEY_SERVER_PORT` - Port of the reference daemon
//! - `DRKEY_EPOCH_DURATION_SECS` - Epoch length of the reference daemon
//! - `DRKEY_MASTER_SECRET` - Hex master secret of the reference daemon
//! - `DRKEY_LOGGING_ENABLED` - Enable the tracing subscriber
//! - `DRKEY_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;

use crate::client::connector::DEFAULT_DAEMON_ADDR;
use crate::drkey::EpochSchedule;
use crate::errors::{DrkeyError, DrkeyResult};

/// Global configuration singleton.
static CONFIG: OnceLock<DrkeyConfig> = OnceLock::new();

/// Minimum master secret length in bytes.
pub const MIN_MASTER_SECRET_LEN: usize = 16;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DrkeyConfig {
    /// Daemon connection used by the roles and the FFI shim
    pub daemon: DaemonConfig,
    /// Reference daemon configuration
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Where and how to reach the key daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// `host:port` or URL of the daemon
    pub address: String,
    /// Deadline for a single request in seconds
    pub request_timeout_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_DAEMON_ADDR.to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Reference daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Epoch length in seconds
    pub epoch_duration_secs: u64,
    /// Hex-encoded master secret; a random one is generated when empty
    pub master_secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 30255,
            epoch_duration_secs: 86_400,
            master_secret: String::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

impl DrkeyConfig {
    /// Load configuration from file and environment, bypassing the cache.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `drkey.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> DrkeyResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("daemon.address", DEFAULT_DAEMON_ADDR)
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_default("daemon.request_timeout_secs", 10)
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_default("server.host", "127.0.0.1")
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_default("server.port", 30255)
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_default("server.epoch_duration_secs", 86_400)
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_default("server.master_secret", "")
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_default("logging.enabled", false)
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            // Load from drkey.toml (optional)
            .add_source(config::File::with_name("drkey").required(false))
            // Override with environment variables
            .set_override_option("daemon.address", env::var("DRKEY_SCIOND_ADDR").ok())
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_override_option(
                "daemon.request_timeout_secs",
                env::var("DRKEY_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_override_option("server.host", env::var("DRKEY_SERVER_HOST").ok())
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_override_option(
                "server.port",
                env::var("DRKEY_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_override_option(
                "server.epoch_duration_secs",
                env::var("DRKEY_EPOCH_DURATION_SECS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_override_option("server.master_secret", env::var("DRKEY_MASTER_SECRET").ok())
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_override_option(
                "logging.enabled",
                env::var("DRKEY_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| DrkeyError::Config(e.to_string()))?
            .set_override_option("logging.level", env::var("DRKEY_LOG_LEVEL").ok())
            .map_err(|e| DrkeyError::Config(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| DrkeyError::Config(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| DrkeyError::Config(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> DrkeyResult<()> {
        if self.daemon.address.trim().is_empty() {
            return Err(DrkeyError::Config(
                "daemon.address cannot be empty".to_string(),
            ));
        }
        if self.daemon.request_timeout_secs == 0 {
            return Err(DrkeyError::Config(
                "daemon.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(DrkeyError::Config(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if self.server.epoch_duration_secs == 0 {
            return Err(DrkeyError::Config(
                "server.epoch_duration_secs must be greater than 0".to_string(),
            ));
        }
        self.master_secret()?;

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(DrkeyError::Config(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.daemon.request_timeout_secs)
    }

    pub fn epoch_schedule(&self) -> DrkeyResult<EpochSchedule> {
        EpochSchedule::new(Duration::from_secs(self.server.epoch_duration_secs)).ok_or_else(|| {
            DrkeyError::Config("server.epoch_duration_secs must be greater than 0".to_string())
        })
    }

    /// Decoded master secret, `None` when unset.
    pub fn master_secret(&self) -> DrkeyResult<Option<Vec<u8>>> {
        let hex_secret = self.server.master_secret.trim();
        if hex_secret.is_empty() {
            return Ok(None);
        }

        let secret = hex::decode(hex_secret)
            .map_err(|e| DrkeyError::Config(format!("server.master_secret is not hex: {e}")))?;
        if secret.len() < MIN_MASTER_SECRET_LEN {
            return Err(DrkeyError::Config(format!(
                "server.master_secret must be at least {MIN_MASTER_SECRET_LEN} bytes, got {}",
                secret.len()
            )));
        }
        Ok(Some(secret))
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> DrkeyResult<&'static DrkeyConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = DrkeyConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is valid.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| DrkeyError::Config("configuration not initialised".to_string()))
}

/// Initialize configuration explicitly.
///
/// Call this early in your application to catch configuration errors.
pub fn init_config() -> DrkeyResult<&'static DrkeyConfig> {
    get_config()
}

/// Daemon address from config, falling back to the built-in default.
pub fn get_daemon_addr() -> String {
    get_config()
        .map(|c| c.daemon.address.clone())
        .unwrap_or_else(|_| DEFAULT_DAEMON_ADDR.to_string())
}

/// Check whether logging is enabled.
pub fn is_logging_enabled() -> bool {
    get_config().map(|c| c.logging.enabled).unwrap_or(false)
}
