//! Tests for the progress dispatcher

use super::*;
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Screen,
    Render(ProgressView),
    Actions(bool),
    Notify(String, NotificationKind),
    ClearLog,
    LogLine(String),
}

#[derive(Default)]
struct RecordingDisplay {
    events: Vec<Event>,
}

impl RecordingDisplay {
    fn rendered_percents(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Render(view) => Some(view.current_percent),
                _ => None,
            })
            .collect()
    }

    fn notifications(&self) -> Vec<(String, NotificationKind)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Event::Notify(text, kind) => Some((text.clone(), *kind)),
                _ => None,
            })
            .collect()
    }
}

impl ProgressDisplay for RecordingDisplay {
    fn show_progress_screen(&mut self) {
        self.events.push(Event::Screen);
    }

    fn render_progress(&mut self, view: &ProgressView) {
        self.events.push(Event::Render(view.clone()));
    }

    fn set_terminal_actions_enabled(&mut self, enabled: bool) {
        self.events.push(Event::Actions(enabled));
    }

    fn show_notification(&mut self, text: &str, kind: NotificationKind) {
        self.events.push(Event::Notify(text.to_string(), kind));
    }

    fn clear_log(&mut self) {
        self.events.push(Event::ClearLog);
    }

    fn append_log_line(&mut self, line: &str) {
        self.events.push(Event::LogLine(line.to_string()));
    }
}

fn setup() -> (ProgressChannel, Arc<NotificationLog>, ProgressDispatcher) {
    let channel = ProgressChannel::in_memory(16);
    let log = Arc::new(NotificationLog::new());
    let dispatcher = ProgressDispatcher::with_parts(channel.clone(), Arc::clone(&log));
    (channel, log, dispatcher)
}

#[test]
fn test_full_update_cycle() {
    let (channel, log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();
    log.append("Installing image");

    channel.send(&ProgressRecord::new(UpdateStatus::Start));
    channel.send(&ProgressRecord::new(UpdateStatus::Run).with_steps(1, 4).with_percent(10));
    channel.send(&ProgressRecord::new(UpdateStatus::Progress).with_steps(2, 4).with_percent(50));
    channel.send(&ProgressRecord::new(UpdateStatus::Success));

    assert_eq!(dispatcher.drain(&mut display), 4);

    assert!(!dispatcher.in_progress());
    assert_eq!(dispatcher.phase(), DisplayPhase::Finished { success: true });
    assert_eq!(display.rendered_percents(), vec![10, 50]);
    assert_eq!(
        display.notifications(),
        vec![
            (IN_PROGRESS_TEXT.to_string(), NotificationKind::Info),
            (SUCCESS_TEXT.to_string(), NotificationKind::Success),
        ]
    );
    assert!(display.events.contains(&Event::LogLine("Installing image".to_string())));
    assert_eq!(display.events.last(), Some(&Event::Actions(true)));
}

#[test]
fn test_start_sequence_order() {
    let (channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();

    channel.send(&ProgressRecord::new(UpdateStatus::Start));
    dispatcher.drain(&mut display);

    assert_eq!(
        display.events,
        vec![
            Event::ClearLog,
            Event::Notify(IN_PROGRESS_TEXT.to_string(), NotificationKind::Info),
            Event::Actions(false),
            Event::Screen,
        ]
    );
    assert!(dispatcher.in_progress());
}

#[test]
fn test_progress_without_start_begins_update() {
    let (channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();

    channel.send(&ProgressRecord::new(UpdateStatus::Download).with_steps(1, 2).with_percent(30));
    channel.send(&ProgressRecord::new(UpdateStatus::Progress).with_steps(2, 2).with_percent(60));
    dispatcher.drain(&mut display);

    let screens = display.events.iter().filter(|e| **e == Event::Screen).count();
    assert_eq!(screens, 1);
    assert_eq!(display.rendered_percents(), vec![30, 60]);
    assert!(dispatcher.in_progress());
}

#[test]
fn test_failure_shows_error() {
    let (channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();

    channel.send(&ProgressRecord::new(UpdateStatus::Run));
    channel.send(&ProgressRecord::failure("Unable to open file"));
    dispatcher.drain(&mut display);

    assert_eq!(dispatcher.phase(), DisplayPhase::Finished { success: false });
    assert_eq!(
        display.notifications().last(),
        Some(&(FAILURE_TEXT.to_string(), NotificationKind::Error))
    );
}

#[test]
fn test_unknown_status_changes_nothing() {
    let (channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();

    channel.send(&ProgressRecord::from_status_code(99));
    assert_eq!(dispatcher.drain(&mut display), 1);

    assert_eq!(dispatcher.phase(), DisplayPhase::Idle);
    assert_eq!(dispatcher.invalid_records(), 1);
    assert!(display.events.is_empty());
}

#[test]
fn test_informational_statuses_ignored() {
    let (channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();

    for status in [UpdateStatus::Idle, UpdateStatus::Done, UpdateStatus::Subprocess] {
        channel.send(&ProgressRecord::new(status));
    }
    dispatcher.drain(&mut display);

    assert_eq!(dispatcher.phase(), DisplayPhase::Idle);
    assert!(display.events.is_empty());
}

#[test]
fn test_drain_on_empty_channel() {
    let (_channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();
    assert_eq!(dispatcher.drain(&mut display), 0);
}

#[test]
fn test_cycles_finished_within_one_drain_all_reported() {
    let (channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();

    for record in [
        ProgressRecord::new(UpdateStatus::Start),
        ProgressRecord::new(UpdateStatus::Success),
        ProgressRecord::new(UpdateStatus::Start),
        ProgressRecord::failure("write error"),
    ] {
        channel.send(&record);
    }
    assert_eq!(dispatcher.drain(&mut display), 4);

    assert_eq!(dispatcher.phase(), DisplayPhase::Finished { success: false });
    assert_eq!(dispatcher.take_finished(), vec![true, false]);
    assert!(dispatcher.take_finished().is_empty());
}

#[test]
fn test_repeated_result_reported_twice() {
    let (channel, _log, mut dispatcher) = setup();
    let mut display = RecordingDisplay::default();

    channel.send(&ProgressRecord::new(UpdateStatus::Success));
    dispatcher.drain(&mut display);
    assert_eq!(dispatcher.take_finished(), vec![true]);

    channel.send(&ProgressRecord::new(UpdateStatus::Success));
    dispatcher.drain(&mut display);
    assert_eq!(dispatcher.phase(), DisplayPhase::Finished { success: true });
    assert_eq!(dispatcher.take_finished(), vec![true]);
}

fn status_strategy() -> impl Strategy<Value = UpdateStatus> {
    (0u32..=8).prop_map(|code| UpdateStatus::from_code(code).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// In progress exactly when the last START/RUN/DOWNLOAD/PROGRESS came
    /// after the last SUCCESS/FAILURE
    #[test]
    fn in_progress_tracks_last_edge(statuses in prop::collection::vec(status_strategy(), 0..40)) {
        let (_channel, _log, mut dispatcher) = setup();
        let mut display = RecordingDisplay::default();
        let mut expected = false;

        for status in statuses {
            dispatcher.dispatch(&ProgressRecord::new(status), &mut display);
            match status {
                UpdateStatus::Start | UpdateStatus::Run | UpdateStatus::Download | UpdateStatus::Progress => {
                    expected = true
                }
                UpdateStatus::Success | UpdateStatus::Failure => expected = false,
                _ => {}
            }
            prop_assert_eq!(dispatcher.in_progress(), expected);
        }
    }
}
