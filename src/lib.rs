//! Recovery progress - update progress coordination for a recovery display
//!
//! This crate connects a firmware update engine to a display:
//! - Update monitor thread collecting progress records and notifications
//! - Bounded progress channel between producer and display loop
//! - Local artifact installation through the engine
//! - Display-side dispatcher driving the progress screen
//! - Notification log with export to removable media

pub mod channel;
pub mod config;
pub mod core;
pub mod dispatcher;
pub mod engine;
pub mod initiator;
pub mod logging;
pub mod monitor;
pub mod notification;

// Re-export commonly used items
pub use channel::{ChannelError, ProgressChannel};
pub use config::RecoveryConfig;
pub use core::context::RecoveryContext;
pub use core::error::{RecoveryError, Result};
pub use core::types::{ProgressRecord, UpdateSource, UpdateStatus};
pub use dispatcher::{ProgressDispatcher, ProgressDisplay};
pub use engine::{UpdateEngine, UpdateRequest};
pub use initiator::UpdateInitiator;
pub use monitor::{MonitorHandle, UpdateMonitor};
pub use notification::NotificationLog;
