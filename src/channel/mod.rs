//! Progress Channel
//!
//! Bounded, non-blocking queue of [`ProgressRecord`]s from the producer side
//! (update monitor, update initiator) to the single consumer (display loop).
//!
//! - Records are encoded to exactly [`RECORD_SIZE`] bytes
//! - Sends never block: a full queue drops progress records
//! - SUCCESS/FAILURE are held in a one-slot pending buffer instead of being
//!   dropped, and go out before any later record, as soon as either side
//!   touches the channel again

mod queue;
#[cfg(test)]
mod tests;

#[cfg(target_os = "linux")]
pub use queue::PosixMessageQueue;
pub use queue::{open_message_queue, MemoryMessageQueue, MessageQueue};

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::core::types::{ProgressRecord, RecordError, RECORD_SIZE};

/// Default queue name shared by producer and consumer
pub const DEFAULT_CHANNEL_NAME: &str = "/recovery-gui-messages";

/// Default number of records the queue can hold
pub const DEFAULT_CHANNEL_CAPACITY: usize = 150;

/// Progress channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to open message queue {name}: {reason}")]
    OpenFailed { name: String, reason: String },

    #[error("Message queue is full")]
    Full,

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("Failed to receive message: {0}")]
    ReceiveFailed(String),

    #[error("Malformed record: {0}")]
    Record(#[from] RecordError),
}

/// What happened to a record handed to [`ProgressChannel::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Enqueued
    Delivered,
    /// Discarded; the consumer will never see it
    Dropped,
    /// Terminal record held back until the queue has room
    Deferred,
}

/// Handle to both ends of the progress queue
///
/// Cloning is cheap; clones share the queue and the pending terminal slot.
#[derive(Clone)]
pub struct ProgressChannel {
    queue: Arc<dyn MessageQueue>,
    pending_terminal: Arc<Mutex<Option<ProgressRecord>>>,
}

impl ProgressChannel {
    /// Open (creating if needed) the named system queue
    pub fn open(name: &str, capacity: usize) -> Result<Self, ChannelError> {
        let queue = open_message_queue(name, capacity, RECORD_SIZE)?;
        Ok(Self::with_queue(Arc::from(queue)))
    }

    /// In-process channel, used by tests and when no system queue is wanted
    pub fn in_memory(capacity: usize) -> Self {
        Self::with_queue(Arc::new(MemoryMessageQueue::new("memory", capacity, RECORD_SIZE)))
    }

    pub fn with_queue(queue: Arc<dyn MessageQueue>) -> Self {
        Self {
            queue,
            pending_terminal: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        self.queue.name()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Enqueue a record without blocking
    ///
    /// A held terminal record is retried first. While it stays held, newer
    /// non-terminal records are dropped and a newer terminal record replaces it.
    pub fn send(&self, record: &ProgressRecord) -> SendOutcome {
        let mut pending = self.pending_terminal.lock();
        self.retry_pending(&mut pending);

        if pending.is_some() {
            if record.is_terminal() {
                tracing::warn!("Progress queue still full, replacing held {} record", record);
                *pending = Some(record.clone());
                return SendOutcome::Deferred;
            }
            tracing::error!("Not able to send progress message {}: terminal record pending", record);
            return SendOutcome::Dropped;
        }

        match self.queue.send(&record.to_bytes()) {
            Ok(()) => SendOutcome::Delivered,
            Err(ChannelError::Full) if record.is_terminal() => {
                tracing::warn!("Progress queue full, holding {} record", record);
                *pending = Some(record.clone());
                SendOutcome::Deferred
            }
            Err(e) => {
                tracing::error!("Not able to send progress message {}: {}", record, e);
                SendOutcome::Dropped
            }
        }
    }

    /// Retry a held terminal record; returns `true` when nothing is pending
    /// afterwards
    pub fn flush_pending(&self) -> bool {
        let mut pending = self.pending_terminal.lock();
        self.retry_pending(&mut pending);
        pending.is_none()
    }

    /// Whether a terminal record is waiting for room in the queue
    pub fn has_pending(&self) -> bool {
        self.pending_terminal.lock().is_some()
    }

    /// Dequeue the next record, or `None` when the queue is empty
    ///
    /// Every dequeue frees a slot, which a held terminal record takes right
    /// away. Malformed messages are reported and skipped.
    pub fn try_receive(&self) -> Option<ProgressRecord> {
        let mut buf = vec![0u8; RECORD_SIZE];
        loop {
            match self.queue.try_receive(&mut buf) {
                Ok(Some(len)) => {
                    self.release_held();
                    match ProgressRecord::from_bytes(&buf[..len]) {
                        Ok(record) => return Some(record),
                        Err(e) => tracing::warn!("Skipping malformed progress message: {}", e),
                    }
                }
                Ok(None) => return None,
                Err(e) => {
                    tracing::error!("Failed to read progress queue {}: {}", self.queue.name(), e);
                    return None;
                }
            }
        }
    }

    fn release_held(&self) {
        let mut pending = self.pending_terminal.lock();
        if pending.is_some() {
            self.retry_pending(&mut pending);
        }
    }

    fn retry_pending(&self, pending: &mut Option<ProgressRecord>) {
        let Some(held) = pending.as_ref() else {
            return;
        };

        match self.queue.send(&held.to_bytes()) {
            Ok(()) => {
                tracing::debug!("Delivered held {} record", held);
                *pending = None;
            }
            Err(ChannelError::Full) => {}
            Err(e) => {
                tracing::error!("Dropping held {} record: {}", held, e);
                *pending = None;
            }
        }
    }
}

impl std::fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("name", &self.queue.name())
            .field("capacity", &self.queue.capacity())
            .field("has_pending", &self.has_pending())
            .finish()
    }
}
