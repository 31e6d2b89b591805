//! Text display for headless devices and the command line

use std::fmt::Arguments;
use std::io::{self, Stdout, Write};

use super::{NotificationKind, ProgressDisplay, ProgressView};

/// [`ProgressDisplay`] writing one line per event
pub struct ConsoleDisplay<W: Write = Stdout> {
    out: W,
    actions_enabled: bool,
    steps_label: String,
    percent_label: String,
}

impl ConsoleDisplay<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            actions_enabled: true,
            steps_label: "NUMBER OF STEPS(0/0)".to_string(),
            percent_label: "CURRENT STEP(0%)".to_string(),
        }
    }

    pub fn actions_enabled(&self) -> bool {
        self.actions_enabled
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, args: Arguments<'_>) {
        if let Err(e) = self.out.write_fmt(args).and_then(|_| self.out.write_all(b"\n")) {
            tracing::warn!("Console display write failed: {}", e);
        }
    }
}

impl<W: Write> ProgressDisplay for ConsoleDisplay<W> {
    fn show_progress_screen(&mut self) {
        self.emit(format_args!("== Update progress =="));
    }

    fn render_progress(&mut self, view: &ProgressView) {
        if let Some(label) = &view.steps_label {
            self.steps_label.clone_from(label);
        }
        if let Some(label) = &view.percent_label {
            self.percent_label.clone_from(label);
        }
        let line = format!(
            "{} [{:>3}%]  {} [{:>3}%]",
            self.steps_label, view.steps_percent, self.percent_label, view.current_percent
        );
        self.emit(format_args!("{}", line));
    }

    fn set_terminal_actions_enabled(&mut self, enabled: bool) {
        self.actions_enabled = enabled;
    }

    fn show_notification(&mut self, text: &str, kind: NotificationKind) {
        let tag = match kind {
            NotificationKind::Info => "INFO",
            NotificationKind::Success => "OK",
            NotificationKind::Warning => "WARN",
            NotificationKind::Error => "ERROR",
        };
        self.emit(format_args!("[{}] {}", tag, text));
    }

    fn clear_log(&mut self) {}

    fn append_log_line(&mut self, line: &str) {
        self.emit(format_args!("  | {}", line));
    }
}
