//! Configuration Storage Implementation
//!
//! JSON file-based configuration:
//! - Every field falls back to its default when missing
//! - Atomic writes using temp file + rename
//! - Validation of values the rest of the crate relies on

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::channel::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_CHANNEL_NAME};
use crate::engine::EngineConfig;
use crate::logging::LoggingConfig;
use crate::monitor::MonitorConfig;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/recovery_gui/config.json";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Configuration format version
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_version() -> u32 {
    1
}

/// Progress channel settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// POSIX message queue name, `/` followed by no further slashes
    #[serde(default = "default_channel_name")]
    pub name: String,

    /// Maximum number of queued records
    #[serde(default = "default_channel_capacity")]
    pub capacity: usize,
}

fn default_channel_name() -> String {
    DEFAULT_CHANNEL_NAME.to_string()
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: default_channel_name(),
            capacity: default_channel_capacity(),
        }
    }
}

/// Local update settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Bytes handed to the engine per chunk request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    256
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Notification log export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Removable media directory receiving exported logs
    #[serde(default = "default_media_path")]
    pub media_path: PathBuf,
}

fn default_media_path() -> PathBuf {
    PathBuf::from("/media/usb/sda")
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            media_path: default_media_path(),
        }
    }
}

/// UI loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Sleep between two UI loop iterations
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    5
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            channel: ChannelConfig::default(),
            engine: EngineConfig::default(),
            monitor: MonitorConfig::default(),
            update: UpdateConfig::default(),
            export: ExportConfig::default(),
            ui: UiConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RecoveryConfig {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        match Self::load(path) {
            Err(ConfigError::NotFound(_)) => {
                tracing::info!("No configuration at {:?}, using defaults", path);
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Save configuration to file with atomic write
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&temp_path, &content) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Check values other modules assume hold
    pub fn validate(&self) -> ConfigResult<()> {
        let name = &self.channel.name;
        if name.len() < 2 || !name.starts_with('/') || name[1..].contains('/') {
            return Err(ConfigError::Invalid(format!(
                "channel name {:?} must be '/' followed by a non-empty name without slashes",
                name
            )));
        }
        if self.channel.capacity == 0 {
            return Err(ConfigError::Invalid("channel capacity must be positive".to_string()));
        }
        if self.update.chunk_size == 0 {
            return Err(ConfigError::Invalid("update chunk size must be positive".to_string()));
        }

        let reconnect = &self.monitor.reconnect;
        if !(reconnect.multiplier >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "reconnect multiplier {} must be at least 1.0",
                reconnect.multiplier
            )));
        }
        if reconnect.initial_delay_ms > reconnect.max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "reconnect initial delay {}ms exceeds maximum {}ms",
                reconnect.initial_delay_ms, reconnect.max_delay_ms
            )));
        }
        if self.monitor.terminal_retry_ms == 0 {
            return Err(ConfigError::Invalid("terminal retry interval must be positive".to_string()));
        }

        Ok(())
    }
}
