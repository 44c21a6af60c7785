//! Bootstrap configuration loading
//!
//! Configuration is resolved in priority order:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables (`ROLLCALL_*`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: the service logs a warning and starts
//! with defaults. A file that exists but cannot be parsed is a `Config` error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP bind address for rollcall-svc
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5730";

/// Default recognition service base URL
pub const DEFAULT_RECOGNITION_URL: &str = "http://localhost:8000";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP listen address (host:port)
    pub bind_addr: String,

    /// Path to SQLite database file
    pub database_path: PathBuf,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Face recognition service connection
    pub recognition: RecognitionConfig,

    /// Notification webhook connection
    pub notification: NotificationConfig,

    /// Background processing limits
    pub processing: ProcessingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

/// Recognition service configuration
///
/// Passed explicitly into the recognition client constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Base URL of the recognition service (no trailing path)
    pub url: String,

    /// Shared API key sent as `X-API-Key` (omitted when empty)
    pub api_key: Option<String>,

    /// Call timeout in milliseconds
    pub timeout_ms: u64,
}

/// Notification webhook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Webhook URL; notifications are reported as failed when unset
    pub webhook_url: Option<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

/// Background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Maximum number of sessions processed concurrently
    pub max_concurrent_jobs: usize,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            recognition: RecognitionConfig::default(),
            notification: NotificationConfig::default(),
            processing: ProcessingConfig::default(),
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

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_RECOGNITION_URL.to_string(),
            api_key: None,
            timeout_ms: 30_000,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 10_000,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
        }
    }
}

impl RecognitionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing file → warning + defaults. Unreadable or malformed file → error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `ROLLCALL_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(addr) = env_string("ROLLCALL_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(path) = env_string("ROLLCALL_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(level) = env_string("ROLLCALL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(url) = env_string("ROLLCALL_RECOGNITION_URL") {
            self.recognition.url = url;
        }
        if let Some(key) = env_string("ROLLCALL_RECOGNITION_API_KEY") {
            self.recognition.api_key = Some(key);
        }
        if let Some(ms) = env_u64("ROLLCALL_RECOGNITION_TIMEOUT_MS") {
            self.recognition.timeout_ms = ms;
        }
        if let Some(url) = env_string("ROLLCALL_NOTIFICATION_WEBHOOK_URL") {
            self.notification.webhook_url = Some(url);
        }
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.trim().is_empty() {
            return Err(Error::Config("bind_addr must not be empty".to_string()));
        }
        if self.recognition.url.trim().is_empty() {
            return Err(Error::Config("recognition.url must not be empty".to_string()));
        }
        if self.recognition.timeout_ms == 0 {
            return Err(Error::Config(
                "recognition.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.processing.max_concurrent_jobs == 0 {
            return Err(Error::Config(
                "processing.max_concurrent_jobs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default config file location: `<config_dir>/rollcall/rollcall.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("rollcall").join("rollcall.toml"))
        .unwrap_or_else(|| PathBuf::from("rollcall.toml"))
}

/// Default database location: `<data_local_dir>/rollcall/rollcall.db`
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("rollcall"))
        .unwrap_or_else(|| PathBuf::from("./rollcall_data"))
        .join("rollcall.db")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a valid integer", key, raw);
            None
        }
    }
}
