//! Update Engine Boundary
//!
//! The update engine is an external collaborator. This module defines the
//! narrow interface the core needs from it:
//!
//! - a progress stream of [`ProgressRecord`]s
//! - a notification stream of free-text log lines
//! - an asynchronous install entry point fed by a chunk-pull callback
//!
//! [`SocketEngine`] implements it over Unix domain sockets.

pub mod socket;
#[cfg(test)]
pub(crate) mod testing;

pub use socket::{SocketEngine, SocketNotifications, SocketProgress};

use std::io;
use std::os::fd::AsFd;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{ProgressRecord, RecordError, UpdateSource, UpdateStatus};

/// Update engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("Connection closed by update engine")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed progress frame: {0}")]
    Record(#[from] RecordError),

    #[error("Update request rejected: {0}")]
    Rejected(String),

    #[error("Failed to start update feeder: {0}")]
    Spawn(String),
}

/// Non-blocking source of progress records
///
/// The descriptor is exposed so the monitor can wait for readiness on
/// several sources at once.
pub trait ProgressSource: AsFd + Send {
    /// Read the next record, or `None` while no complete record has arrived
    fn receive(&mut self) -> Result<Option<ProgressRecord>, EngineError>;
}

/// Non-blocking source of free-text notification messages
pub trait NotificationSource: AsFd + Send {
    /// Read the next message, or `None` while no complete message has arrived
    fn receive(&mut self) -> Result<Option<String>, EngineError>;

    /// Whether a complete message is already buffered in user space and can
    /// be read without waiting on the descriptor
    fn has_buffered(&self) -> bool {
        false
    }
}

/// Pull callback filling the buffer with the next chunk of the artifact;
/// returns the chunk length, 0 meaning end of data
pub type ChunkFeed = Box<dyn FnMut(&mut [u8]) -> usize + Send>;

/// Callback invoked exactly once when an accepted update has finished
pub type EndOfUpdate = Box<dyn FnOnce(UpdateStatus) + Send>;

/// Parameters of one install request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRequest {
    pub dry_run: bool,
    pub source: UpdateSource,
    /// Size of the buffer handed to the chunk feed
    pub chunk_size: usize,
}

impl UpdateRequest {
    pub fn local(dry_run: bool, chunk_size: usize) -> Self {
        Self {
            dry_run,
            source: UpdateSource::Local,
            chunk_size,
        }
    }
}

/// The external update engine
pub trait UpdateEngine: Send + Sync {
    fn connect_progress(&self) -> Result<Box<dyn ProgressSource>, EngineError>;

    fn connect_notifications(&self) -> Result<Box<dyn NotificationSource>, EngineError>;

    /// Start an update asynchronously
    ///
    /// On `Ok`, the engine pulls chunks through `feed` and calls `on_end`
    /// exactly once. On `Err`, neither callback is ever invoked.
    fn start_update(
        &self,
        request: UpdateRequest,
        feed: ChunkFeed,
        on_end: EndOfUpdate,
    ) -> Result<(), EngineError>;
}

/// Socket locations of the engine bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Stream of fixed-size progress frames
    pub progress_socket: PathBuf,

    /// Stream of newline-terminated notification messages
    pub notification_socket: PathBuf,

    /// Install requests
    pub control_socket: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_socket: PathBuf::from("/tmp/swupdateprog"),
            notification_socket: PathBuf::from("/tmp/swupdatenotify"),
            control_socket: PathBuf::from("/tmp/sockinstctrl"),
        }
    }
}

impl EngineConfig {
    /// All sockets inside one directory, using the default file names
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            progress_socket: dir.join("swupdateprog"),
            notification_socket: dir.join("swupdatenotify"),
            control_socket: dir.join("sockinstctrl"),
        }
    }
}
