//! Progress Dispatcher
//!
//! Consumer side of the progress channel, run from the UI loop:
//!
//! - Drains every pending record on each tick, in order
//! - Drives the display-facing [`DisplayPhase`] state machine
//! - Calls out to a [`ProgressDisplay`] to render what changed

mod console;
#[cfg(test)]
mod tests;
mod view;

pub use console::ConsoleDisplay;
pub use view::ProgressView;

use std::sync::Arc;

use crate::channel::ProgressChannel;
use crate::core::context::RecoveryContext;
use crate::core::types::{ProgressRecord, UpdateStatus};
use crate::notification::NotificationLog;

/// Banner shown while an update runs
pub const IN_PROGRESS_TEXT: &str = "UPDATE IN PROGRESS";
pub const SUCCESS_TEXT: &str = "Success!";
pub const FAILURE_TEXT: &str = "Update failed!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Screen collaborator driven by the dispatcher
pub trait ProgressDisplay {
    /// Navigate to the progress screen
    fn show_progress_screen(&mut self);

    fn render_progress(&mut self, view: &ProgressView);

    /// Enable or disable the actions offered once an update is over
    /// (OK, show logs)
    fn set_terminal_actions_enabled(&mut self, enabled: bool);

    fn show_notification(&mut self, text: &str, kind: NotificationKind);

    fn clear_log(&mut self);

    fn append_log_line(&mut self, line: &str);
}

/// Presentation-side update state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayPhase {
    #[default]
    Idle,
    InProgress,
    Finished {
        success: bool,
    },
}

/// Display work requested by one transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisplayStep {
    /// Enter the in-progress view
    pub begin: bool,
    /// Render the record's progress
    pub render: bool,
    /// Show the result; `Some(true)` for success
    pub finish: Option<bool>,
}

impl DisplayPhase {
    pub fn on_status(self, status: UpdateStatus) -> (Self, DisplayStep) {
        let begin = self != Self::InProgress;
        match status {
            UpdateStatus::Start => (
                Self::InProgress,
                DisplayStep {
                    begin,
                    ..DisplayStep::default()
                },
            ),
            UpdateStatus::Run | UpdateStatus::Download | UpdateStatus::Progress => (
                Self::InProgress,
                DisplayStep {
                    begin,
                    render: true,
                    finish: None,
                },
            ),
            UpdateStatus::Success | UpdateStatus::Failure => {
                let success = status == UpdateStatus::Success;
                (
                    Self::Finished { success },
                    DisplayStep {
                        finish: Some(success),
                        ..DisplayStep::default()
                    },
                )
            }
            UpdateStatus::Idle | UpdateStatus::Done | UpdateStatus::Subprocess => {
                (self, DisplayStep::default())
            }
        }
    }

    pub fn in_progress(self) -> bool {
        self == Self::InProgress
    }
}

pub struct ProgressDispatcher {
    channel: ProgressChannel,
    log: Arc<NotificationLog>,
    phase: DisplayPhase,
    invalid_records: u64,
    // results of update cycles finished since the last take, oldest first
    finished: Vec<bool>,
}

impl ProgressDispatcher {
    pub fn new(context: &RecoveryContext) -> Self {
        Self::with_parts(context.channel().clone(), context.log())
    }

    pub fn with_parts(channel: ProgressChannel, log: Arc<NotificationLog>) -> Self {
        Self {
            channel,
            log,
            phase: DisplayPhase::default(),
            invalid_records: 0,
            finished: Vec::new(),
        }
    }

    pub fn phase(&self) -> DisplayPhase {
        self.phase
    }

    pub fn in_progress(&self) -> bool {
        self.phase.in_progress()
    }

    /// Records with a status this build does not know
    pub fn invalid_records(&self) -> u64 {
        self.invalid_records
    }

    /// Results of the update cycles finished since the previous call,
    /// `true` for success, in the order they finished
    ///
    /// Every terminal record counts, including a repeat of the same result.
    pub fn take_finished(&mut self) -> Vec<bool> {
        std::mem::take(&mut self.finished)
    }

    /// Handle every pending record; returns how many were handled
    pub fn drain(&mut self, display: &mut dyn ProgressDisplay) -> usize {
        let mut handled = 0;
        while let Some(record) = self.channel.try_receive() {
            self.dispatch(&record, display);
            handled += 1;
        }
        handled
    }

    pub fn dispatch(&mut self, record: &ProgressRecord, display: &mut dyn ProgressDisplay) {
        let Some(status) = record.status() else {
            tracing::warn!("Invalid update state {}", record.status_code());
            self.invalid_records += 1;
            return;
        };

        let (phase, step) = self.phase.on_status(status);
        self.phase = phase;

        if step.begin {
            tracing::info!("Update started, source: {}", record.source_code());
            begin_update(display);
        }
        if step.render {
            display.render_progress(&ProgressView::from_record(record));
        }
        if let Some(success) = step.finish {
            tracing::info!("Update finished: {}", status);
            self.finish_update(display, success);
        }
    }

    fn finish_update(&mut self, display: &mut dyn ProgressDisplay, success: bool) {
        self.finished.push(success);
        let snapshot = self.log.snapshot();
        display.clear_log();
        for entry in &snapshot {
            display.append_log_line(entry.text());
        }

        if success {
            display.show_notification(SUCCESS_TEXT, NotificationKind::Success);
        } else {
            display.show_notification(FAILURE_TEXT, NotificationKind::Error);
        }
        display.set_terminal_actions_enabled(true);
    }
}

fn begin_update(display: &mut dyn ProgressDisplay) {
    display.clear_log();
    display.show_notification(IN_PROGRESS_TEXT, NotificationKind::Info);
    display.set_terminal_actions_enabled(false);
    display.show_progress_screen();
}
