//! Transport-side state machines
//!
//! - [`ConnectionState`]: connection to the engine's progress stream
//! - [`UpdateLifecycle`]: whether the engine is between updates, driven by
//!   the status of consecutive progress records

use crate::core::types::UpdateStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    /// Progress stream connected; `notifications` tells whether the
    /// notification stream is connected as well
    Connected { notifications: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Attempt,
    Established { notifications: bool },
    ConnectFailed,
    ReadFailed,
}

impl ConnectionState {
    pub fn on(self, event: ConnectionEvent) -> Self {
        match (self, event) {
            (Self::Disconnected, ConnectionEvent::Attempt) => Self::Connecting,
            (Self::Connecting, ConnectionEvent::Established { notifications }) => {
                Self::Connected { notifications }
            }
            (Self::Connecting, ConnectionEvent::ConnectFailed) => Self::Disconnected,
            (Self::Connected { .. }, ConnectionEvent::ReadFailed) => Self::Disconnected,
            (state, event) => {
                tracing::debug!("Ignoring {:?} in connection state {:?}", event, state);
                state
            }
        }
    }

    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateLifecycle {
    /// Between updates; the next START or RUN begins one
    #[default]
    WaitingForUpdate,
    InProgress,
}

/// Edge reported by [`UpdateLifecycle::on_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Finished(UpdateStatus),
}

impl UpdateLifecycle {
    pub fn on_status(self, status: UpdateStatus) -> (Self, Option<LifecycleEvent>) {
        match (self, status) {
            (Self::WaitingForUpdate, UpdateStatus::Start | UpdateStatus::Run) => {
                (Self::InProgress, Some(LifecycleEvent::Started))
            }
            (_, UpdateStatus::Success | UpdateStatus::Failure) => {
                (Self::WaitingForUpdate, Some(LifecycleEvent::Finished(status)))
            }
            (state, _) => (state, None),
        }
    }

    /// The `waitingForNextUpdate` latch
    pub fn waiting_for_next_update(self) -> bool {
        self == Self::WaitingForUpdate
    }
}
