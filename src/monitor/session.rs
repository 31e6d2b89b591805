//! Monitor session
//!
//! Working state of the monitor thread: the two engine streams, both state
//! machines and the last record seen. One call to [`MonitorSession::step`]
//! is one iteration of the monitor loop.

use std::os::fd::AsFd;
use std::sync::Arc;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use super::state::{ConnectionEvent, ConnectionState, LifecycleEvent, UpdateLifecycle};
use super::stop::{poll_timeout, StopSignal};
use super::{MonitorConfig, MonitorError, NOTIFY_CONNECT_FAILED, READ_FAILED};
use crate::channel::ProgressChannel;
use crate::core::types::{ProgressRecord, UpdateSource};
use crate::engine::{EngineError, NotificationSource, ProgressSource, UpdateEngine};
use crate::notification::NotificationLog;

/// Readable, hung up or failed; a read will not block in any of these cases
fn is_ready(fd: &PollFd<'_>) -> bool {
    fd.revents().is_some_and(|revents| {
        revents.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL)
    })
}

/// Result of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Both streams (or the progress stream alone) are now connected
    Connected,
    ConnectFailed,
    /// At least one message was read
    Serviced,
    /// A read failed and the streams were dropped
    ReadFailed,
    /// Woke up without reading anything
    Idle,
    Stopped,
}

pub struct MonitorSession {
    engine: Arc<dyn UpdateEngine>,
    log: Arc<NotificationLog>,
    channel: ProgressChannel,
    stop: StopSignal,
    terminal_retry: Duration,
    progress: Option<Box<dyn ProgressSource>>,
    notifications: Option<Box<dyn NotificationSource>>,
    connection: ConnectionState,
    lifecycle: UpdateLifecycle,
    last_record: Option<ProgressRecord>,
}

impl MonitorSession {
    pub fn new(
        engine: Arc<dyn UpdateEngine>,
        log: Arc<NotificationLog>,
        channel: ProgressChannel,
        config: &MonitorConfig,
        stop: StopSignal,
    ) -> Self {
        Self {
            engine,
            log,
            channel,
            stop,
            terminal_retry: Duration::from_millis(config.terminal_retry_ms.max(1)),
            progress: None,
            notifications: None,
            connection: ConnectionState::default(),
            lifecycle: UpdateLifecycle::default(),
            last_record: None,
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn lifecycle(&self) -> UpdateLifecycle {
        self.lifecycle
    }

    pub fn waiting_for_next_update(&self) -> bool {
        self.lifecycle.waiting_for_next_update()
    }

    pub fn last_record(&self) -> Option<&ProgressRecord> {
        self.last_record.as_ref()
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Run one iteration: connect when disconnected, otherwise wait for
    /// either stream (or a stop request) and service what is ready
    pub fn step(&mut self) -> Result<StepOutcome, MonitorError> {
        if self.stop.is_requested() {
            return Ok(StepOutcome::Stopped);
        }
        if self.progress.is_none() {
            return Ok(self.connect());
        }
        self.service()
    }

    fn transition(&mut self, event: ConnectionEvent) {
        self.connection = self.connection.on(event);
    }

    fn connect(&mut self) -> StepOutcome {
        self.transition(ConnectionEvent::Attempt);

        let progress = match self.engine.connect_progress() {
            Ok(progress) => progress,
            Err(e) => {
                tracing::error!("Failed to connect to the update engine: {}", e);
                self.transition(ConnectionEvent::ConnectFailed);
                return StepOutcome::ConnectFailed;
            }
        };
        self.progress = Some(progress);

        let notifications = match self.engine.connect_notifications() {
            Ok(source) => {
                self.notifications = Some(source);
                true
            }
            Err(e) => {
                tracing::error!("{} {}", NOTIFY_CONNECT_FAILED, e);
                self.log.append(NOTIFY_CONNECT_FAILED);
                false
            }
        };

        self.transition(ConnectionEvent::Established { notifications });
        tracing::info!("Connected to the update engine (notifications: {})", notifications);
        StepOutcome::Connected
    }

    fn service(&mut self) -> Result<StepOutcome, MonitorError> {
        let buffered = self
            .notifications
            .as_ref()
            .is_some_and(|source| source.has_buffered());
        let timeout = if buffered {
            PollTimeout::ZERO
        } else if self.channel.has_pending() {
            poll_timeout(self.terminal_retry)
        } else {
            PollTimeout::NONE
        };

        let (stop_ready, progress_ready, notifications_ready) = {
            let Some(progress) = self.progress.as_ref() else {
                return Ok(StepOutcome::Idle);
            };

            let mut fds = vec![
                PollFd::new(self.stop.as_fd(), PollFlags::POLLIN),
                PollFd::new(progress.as_fd(), PollFlags::POLLIN),
            ];
            if let Some(source) = self.notifications.as_ref() {
                fds.push(PollFd::new(source.as_fd(), PollFlags::POLLIN));
            }

            match poll(&mut fds, timeout) {
                Ok(_) => {}
                Err(Errno::EINTR) => return Ok(StepOutcome::Idle),
                Err(e) => return Err(MonitorError::Poll(e)),
            }

            (
                is_ready(&fds[0]),
                is_ready(&fds[1]),
                fds.get(2).is_some_and(is_ready),
            )
        };

        if stop_ready || self.stop.is_requested() {
            return Ok(StepOutcome::Stopped);
        }

        let mut outcome = StepOutcome::Idle;

        if progress_ready {
            if let Some(progress) = self.progress.as_mut() {
                match progress.receive() {
                    Ok(Some(record)) => {
                        self.handle_record(record);
                        outcome = StepOutcome::Serviced;
                    }
                    Ok(None) => {}
                    Err(EngineError::Record(e)) => {
                        tracing::warn!("Skipping malformed progress frame: {}", e);
                        outcome = StepOutcome::Serviced;
                    }
                    Err(e) => return Ok(self.read_failed(e)),
                }
            }
        }

        if notifications_ready || buffered {
            while let Some(source) = self.notifications.as_mut() {
                match source.receive() {
                    Ok(Some(message)) => {
                        self.log.append(&message);
                        outcome = StepOutcome::Serviced;
                    }
                    // partial line, the rest comes with a later wakeup
                    Ok(None) => break,
                    Err(e) => return Ok(self.read_failed(e)),
                }
                if !self.notifications.as_ref().is_some_and(|source| source.has_buffered()) {
                    break;
                }
            }
        }

        if self.channel.has_pending() {
            self.channel.flush_pending();
        }

        Ok(outcome)
    }

    fn read_failed(&mut self, error: EngineError) -> StepOutcome {
        tracing::error!("{} {}", READ_FAILED, error);
        self.progress = None;
        self.notifications = None;
        self.log.append(READ_FAILED);
        self.transition(ConnectionEvent::ReadFailed);
        StepOutcome::ReadFailed
    }

    fn handle_record(&mut self, record: ProgressRecord) {
        self.channel.send(&record);

        match record.status() {
            Some(status) => {
                let (lifecycle, event) = self.lifecycle.on_status(status);
                self.lifecycle = lifecycle;
                match event {
                    Some(LifecycleEvent::Started) => tracing::info!(
                        "Update started, interface: {}",
                        UpdateSource::label_for_code(record.source_code())
                    ),
                    Some(LifecycleEvent::Finished(status)) => {
                        tracing::info!("Update finished: {}", status)
                    }
                    None => tracing::debug!("Progress: {}", record),
                }
            }
            None => tracing::warn!("Invalid update status {} received", record.status_code()),
        }

        self.last_record = Some(record);
    }
}
