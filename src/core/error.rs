//! Error types
//!
//! Crate-wide error type plus the classification used to decide whether an
//! error stops the process, is recovered locally, or is only reported.

use thiserror::Error;

use crate::channel::ChannelError;
use crate::config::ConfigError;
use crate::core::types::RecordError;
use crate::engine::EngineError;
use crate::initiator::InitiatorError;
use crate::logging::LoggingError;
use crate::monitor::MonitorError;
use crate::notification::ExportError;

/// Result type alias for crate operations
pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Main error type
#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Progress channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Update engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Update monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Update initiator error: {0}")]
    Initiator(#[from] InitiatorError),

    #[error("Log export error: {0}")]
    Export(#[from] ExportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Progress record error: {0}")]
    Record(#[from] RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How an error is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Startup invariant broken; nothing meaningful can run without it
    Fatal,
    /// I/O failure recovered locally by retrying or failing one update attempt
    Transient,
    /// Malformed or unrecognized data; reported and skipped
    Protocol,
}

/// Trait for classifying errors
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

impl Classify for RecoveryError {
    fn class(&self) -> ErrorClass {
        match self {
            RecoveryError::Channel(e) => e.class(),
            RecoveryError::Monitor(e) => e.class(),
            RecoveryError::Engine(_) => ErrorClass::Transient,
            RecoveryError::Initiator(_) => ErrorClass::Transient,
            RecoveryError::Export(_) => ErrorClass::Transient,
            RecoveryError::Io(_) => ErrorClass::Transient,
            RecoveryError::Record(_) => ErrorClass::Protocol,
            RecoveryError::Config(_) | RecoveryError::Logging(_) => ErrorClass::Fatal,
        }
    }
}

impl Classify for ChannelError {
    fn class(&self) -> ErrorClass {
        match self {
            ChannelError::OpenFailed { .. } => ErrorClass::Fatal,
            ChannelError::Full | ChannelError::SendFailed(_) | ChannelError::ReceiveFailed(_) => {
                ErrorClass::Transient
            }
            ChannelError::Record(_) => ErrorClass::Protocol,
        }
    }
}

impl Classify for MonitorError {
    fn class(&self) -> ErrorClass {
        match self {
            MonitorError::SpawnFailed(_) => ErrorClass::Fatal,
            MonitorError::ReconnectLimit { .. } | MonitorError::Poll(_) => ErrorClass::Transient,
        }
    }
}
