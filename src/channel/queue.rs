//! Message Queue Module
//!
//! Bounded, non-blocking byte queues carrying fixed-size messages between the
//! producer (update monitor) and the consumer (display thread).
//!
//! - Linux: named POSIX message queue via `mq_open`
//! - Everywhere: in-process queue for development/testing

use std::collections::VecDeque;

use parking_lot::Mutex;

use super::ChannelError;

/// Trait for non-blocking message queue operations
pub trait MessageQueue: Send + Sync {
    /// Enqueue one message; fails with [`ChannelError::Full`] instead of blocking
    fn send(&self, message: &[u8]) -> Result<(), ChannelError>;

    /// Dequeue one message into `buf`, returning its length, or `None` when
    /// nothing is pending
    fn try_receive(&self, buf: &mut [u8]) -> Result<Option<usize>, ChannelError>;

    /// Maximum number of messages held at once
    fn capacity(&self) -> usize;

    /// Name the queue was opened with
    fn name(&self) -> &str;
}

// ============================================================================
// POSIX Implementation
// ============================================================================

#[cfg(target_os = "linux")]
mod posix_impl {
    use super::*;
    use nix::errno::Errno;
    use nix::mqueue::{mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_unlink, MQ_OFlag, MqAttr, MqdT};
    use nix::sys::stat::Mode;

    /// Named POSIX message queue holding one write end and one read end
    pub struct PosixMessageQueue {
        name: String,
        capacity: usize,
        producer: Option<MqdT>,
        consumer: Option<MqdT>,
    }

    impl PosixMessageQueue {
        /// Create (if needed) and open both ends of the queue `name`
        ///
        /// Both descriptors are non-blocking. An already existing queue is
        /// reused as long as its message size matches `message_size`.
        pub fn open(name: &str, capacity: usize, message_size: usize) -> Result<Self, ChannelError> {
            let open_failed = |reason: String| ChannelError::OpenFailed {
                name: name.to_string(),
                reason,
            };

            let attr = MqAttr::new(0, capacity as _, message_size as _, 0);
            let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IWGRP;

            let producer = mq_open(
                name,
                MQ_OFlag::O_WRONLY | MQ_OFlag::O_CREAT | MQ_OFlag::O_NONBLOCK,
                mode,
                Some(&attr),
            )
            .map_err(|e| open_failed(format!("producer mq_open: {}", e)))?;

            let consumer = match mq_open(name, MQ_OFlag::O_RDONLY | MQ_OFlag::O_NONBLOCK, Mode::empty(), None) {
                Ok(consumer) => consumer,
                Err(e) => {
                    let _ = mq_close(producer);
                    return Err(open_failed(format!("consumer mq_open: {}", e)));
                }
            };

            let queue = Self {
                name: name.to_string(),
                capacity,
                producer: Some(producer),
                consumer: Some(consumer),
            };

            let actual = queue
                .consumer
                .as_ref()
                .map(mq_getattr)
                .transpose()
                .map_err(|e| open_failed(format!("mq_getattr: {}", e)))?;

            if let Some(actual) = actual {
                if actual.msgsize() as usize != message_size {
                    return Err(open_failed(format!(
                        "existing queue has message size {}, expected {}",
                        actual.msgsize(),
                        message_size
                    )));
                }
            }

            tracing::info!("Opened progress queue {} (capacity {})", name, capacity);
            Ok(queue)
        }

        /// Remove the queue name from the system
        pub fn unlink(name: &str) -> Result<(), ChannelError> {
            mq_unlink(name).map_err(|e| ChannelError::OpenFailed {
                name: name.to_string(),
                reason: format!("mq_unlink: {}", e),
            })
        }
    }

    impl MessageQueue for PosixMessageQueue {
        fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
            let producer = self
                .producer
                .as_ref()
                .ok_or_else(|| ChannelError::SendFailed("queue closed".to_string()))?;

            match mq_send(producer, message, 0) {
                Ok(()) => Ok(()),
                Err(Errno::EAGAIN) => Err(ChannelError::Full),
                Err(e) => Err(ChannelError::SendFailed(e.to_string())),
            }
        }

        fn try_receive(&self, buf: &mut [u8]) -> Result<Option<usize>, ChannelError> {
            let consumer = self
                .consumer
                .as_ref()
                .ok_or_else(|| ChannelError::ReceiveFailed("queue closed".to_string()))?;

            let mut priority = 0u32;
            match mq_receive(consumer, buf, &mut priority) {
                Ok(len) => Ok(Some(len)),
                Err(Errno::EAGAIN) => Ok(None),
                Err(e) => Err(ChannelError::ReceiveFailed(e.to_string())),
            }
        }

        fn capacity(&self) -> usize {
            self.capacity
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    impl Drop for PosixMessageQueue {
        fn drop(&mut self) {
            if let Some(producer) = self.producer.take() {
                let _ = mq_close(producer);
            }
            if let Some(consumer) = self.consumer.take() {
                let _ = mq_close(consumer);
            }
        }
    }
}

#[cfg(target_os = "linux")]
pub use posix_impl::PosixMessageQueue;

// ============================================================================
// In-process Implementation
// ============================================================================

/// In-process bounded queue with the same non-blocking contract
pub struct MemoryMessageQueue {
    name: String,
    capacity: usize,
    message_size: usize,
    messages: Mutex<VecDeque<Vec<u8>>>,
}

impl MemoryMessageQueue {
    pub fn new(name: impl Into<String>, capacity: usize, message_size: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            message_size,
            messages: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Number of messages currently queued
    pub fn pending(&self) -> usize {
        self.messages.lock().len()
    }
}

impl MessageQueue for MemoryMessageQueue {
    fn send(&self, message: &[u8]) -> Result<(), ChannelError> {
        if message.len() > self.message_size {
            return Err(ChannelError::SendFailed(format!(
                "message of {} bytes exceeds message size {}",
                message.len(),
                self.message_size
            )));
        }

        let mut messages = self.messages.lock();
        if messages.len() >= self.capacity {
            return Err(ChannelError::Full);
        }
        messages.push_back(message.to_vec());
        Ok(())
    }

    fn try_receive(&self, buf: &mut [u8]) -> Result<Option<usize>, ChannelError> {
        let mut messages = self.messages.lock();
        let Some(message) = messages.front() else {
            return Ok(None);
        };

        if message.len() > buf.len() {
            return Err(ChannelError::ReceiveFailed(format!(
                "buffer of {} bytes too small for {} byte message",
                buf.len(),
                message.len()
            )));
        }

        let len = message.len();
        buf[..len].copy_from_slice(message);
        messages.pop_front();
        Ok(Some(len))
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Platform-agnostic factory function
// ============================================================================

/// Open a platform-appropriate named queue
#[cfg(target_os = "linux")]
pub fn open_message_queue(
    name: &str,
    capacity: usize,
    message_size: usize,
) -> Result<Box<dyn MessageQueue>, ChannelError> {
    Ok(Box::new(PosixMessageQueue::open(name, capacity, message_size)?))
}

#[cfg(not(target_os = "linux"))]
pub fn open_message_queue(
    name: &str,
    capacity: usize,
    message_size: usize,
) -> Result<Box<dyn MessageQueue>, ChannelError> {
    tracing::warn!("POSIX message queues unavailable, using in-process queue for {}", name);
    Ok(Box::new(MemoryMessageQueue::new(name, capacity, message_size)))
}
