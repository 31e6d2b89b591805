//! Configuration Management Module
//!
//! Provides persistent configuration storage with:
//! - JSON file-based storage with per-field defaults
//! - Atomic saves
//! - Validation on load and save

mod storage;
#[cfg(test)]
mod tests;

pub use storage::{
    ChannelConfig, ConfigError, ConfigResult, ExportConfig, RecoveryConfig, UiConfig,
    UpdateConfig, DEFAULT_CONFIG_PATH,
};
