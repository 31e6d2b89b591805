//! Update Monitor
//!
//! Dedicated thread that follows the update engine:
//!
//! - Connects to the progress and notification streams, reconnecting with
//!   backoff after failures
//! - Forwards every progress record to the [`ProgressChannel`]
//! - Appends every notification message to the [`NotificationLog`]
//! - Tracks when an update starts and ends
//!
//! The thread stops when [`MonitorHandle::stop`] is called, when the handle
//! is dropped, or when the reconnect policy gives up.

mod policy;
mod session;
mod state;
mod stop;

pub use policy::ReconnectPolicy;
pub use session::{MonitorSession, StepOutcome};
pub use state::{ConnectionEvent, ConnectionState, LifecycleEvent, UpdateLifecycle};
pub use stop::{stop_channel, StopHandle, StopSignal};

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nix::errno::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::ProgressChannel;
use crate::core::context::RecoveryContext;
use crate::engine::UpdateEngine;
use crate::notification::NotificationLog;

/// Logged when the progress stream is up but the notification stream is not
pub const NOTIFY_CONNECT_FAILED: &str =
    "Failed to connect to the update engine to get notification messages.";

/// Logged when reading either stream fails; both streams are reconnected
pub const READ_FAILED: &str =
    "Failed to read a message from the update engine. Reconnecting to collect further messages.";

/// Update monitor errors
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Failed to start the update monitor thread: {0}")]
    SpawnFailed(String),

    #[error("Gave up connecting to the update engine after {attempts} consecutive failures")]
    ReconnectLimit { attempts: u32 },

    #[error("Waiting for update engine messages failed: {0}")]
    Poll(Errno),
}

fn default_terminal_retry_ms() -> u64 {
    50
}

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub reconnect: ReconnectPolicy,

    /// Retry interval for a SUCCESS/FAILURE record held back by a full channel
    #[serde(default = "default_terminal_retry_ms")]
    pub terminal_retry_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            terminal_retry_ms: default_terminal_retry_ms(),
        }
    }
}

/// Handle to a running monitor thread
pub struct MonitorHandle {
    stop: StopHandle,
    thread: Option<JoinHandle<Result<(), MonitorError>>>,
}

impl MonitorHandle {
    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the thread and wait for it
    pub fn stop(&mut self) -> Result<(), MonitorError> {
        self.stop.request();
        self.join_thread()
    }

    /// Wait for the thread to exit on its own
    pub fn join(mut self) -> Result<(), MonitorError> {
        self.join_thread()
    }

    fn join_thread(&mut self) -> Result<(), MonitorError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Update monitor thread panicked");
                Ok(())
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.stop() {
                tracing::warn!("Update monitor ended with error: {}", e);
            }
        }
    }
}

/// Spawns the monitor thread
pub struct UpdateMonitor;

impl UpdateMonitor {
    /// Start monitoring `engine`, feeding the context's channel and log
    pub fn spawn(engine: Arc<dyn UpdateEngine>, context: &RecoveryContext) -> crate::Result<MonitorHandle> {
        let handle = Self::spawn_with(
            engine,
            context.log(),
            context.channel().clone(),
            context.config().monitor.clone(),
        )?;
        Ok(handle)
    }

    pub fn spawn_with(
        engine: Arc<dyn UpdateEngine>,
        log: Arc<NotificationLog>,
        channel: ProgressChannel,
        config: MonitorConfig,
    ) -> Result<MonitorHandle, MonitorError> {
        let (stop, signal) = stop_channel().map_err(|e| MonitorError::SpawnFailed(e.to_string()))?;
        let session = MonitorSession::new(engine, log, channel, &config, signal);

        let thread = thread::Builder::new()
            .name("update-monitor".to_string())
            .spawn(move || run(session, &config.reconnect))
            .map_err(|e| MonitorError::SpawnFailed(e.to_string()))?;

        tracing::info!("Update monitor started");
        Ok(MonitorHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Monitor loop: step the session, backing off after failures
fn run(mut session: MonitorSession, policy: &ReconnectPolicy) -> Result<(), MonitorError> {
    let mut failures = 0u32;

    loop {
        match session.step()? {
            StepOutcome::Stopped => break,
            StepOutcome::ConnectFailed | StepOutcome::ReadFailed => {
                failures = failures.saturating_add(1);
                if !policy.allows_retry(failures) {
                    tracing::error!("Update monitor giving up after {} failures", failures);
                    return Err(MonitorError::ReconnectLimit { attempts: failures });
                }
                if session.stop_signal().wait(policy.delay_for(failures)) {
                    break;
                }
            }
            StepOutcome::Serviced => failures = 0,
            StepOutcome::Connected | StepOutcome::Idle => {}
        }
    }

    tracing::info!("Update monitor stopped");
    Ok(())
}
