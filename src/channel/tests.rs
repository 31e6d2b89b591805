//! Tests for the progress channel

use super::*;
use crate::core::types::{UpdateSource, UpdateStatus};
use proptest::prelude::*;

fn run(step: u32) -> ProgressRecord {
    ProgressRecord::new(UpdateStatus::Run).with_steps(step, 10)
}

fn drain(channel: &ProgressChannel) -> Vec<ProgressRecord> {
    std::iter::from_fn(|| channel.try_receive()).collect()
}

#[test]
fn test_send_and_receive_in_order() {
    let channel = ProgressChannel::in_memory(8);
    let records = vec![
        ProgressRecord::new(UpdateStatus::Start).with_source(UpdateSource::Local),
        run(1),
        ProgressRecord::new(UpdateStatus::Progress).with_steps(2, 10).with_percent(50),
    ];

    for record in &records {
        assert_eq!(channel.send(record), SendOutcome::Delivered);
    }

    assert_eq!(drain(&channel), records);
    assert_eq!(channel.try_receive(), None);
}

#[test]
fn test_full_channel_drops_progress() {
    let channel = ProgressChannel::in_memory(2);
    channel.send(&run(1));
    channel.send(&run(2));

    assert_eq!(channel.send(&run(3)), SendOutcome::Dropped);
    assert_eq!(drain(&channel), vec![run(1), run(2)]);
}

#[test]
fn test_terminal_record_held_when_full() {
    let channel = ProgressChannel::in_memory(1);
    channel.send(&run(1));

    let success = ProgressRecord::new(UpdateStatus::Success);
    assert_eq!(channel.send(&success), SendOutcome::Deferred);
    assert!(channel.has_pending());

    assert_eq!(channel.try_receive(), Some(run(1)));
    assert!(channel.flush_pending());
    assert!(!channel.has_pending());
    assert_eq!(channel.try_receive(), Some(success));
}

#[test]
fn test_pending_terminal_goes_out_before_later_records() {
    let channel = ProgressChannel::in_memory(1);
    channel.send(&run(1));
    channel.send(&ProgressRecord::failure("boom"));

    // still full: the later progress record cannot overtake the failure
    assert_eq!(channel.send(&run(2)), SendOutcome::Dropped);

    assert_eq!(channel.try_receive(), Some(run(1)));

    // the dequeue moved the held failure into the freed slot, leaving no room for START
    let start = ProgressRecord::new(UpdateStatus::Start);
    assert_eq!(channel.send(&start), SendOutcome::Dropped);

    let received = channel.try_receive().unwrap();
    assert_eq!(received.status(), Some(UpdateStatus::Failure));
    assert_eq!(received.info(), "boom");
    assert_eq!(channel.try_receive(), None);

    assert_eq!(channel.send(&start), SendOutcome::Delivered);
    assert_eq!(channel.try_receive(), Some(start));
}

#[test]
fn test_consumer_alone_releases_held_terminal() {
    let channel = ProgressChannel::in_memory(1);
    assert_eq!(channel.send(&run(1)), SendOutcome::Delivered);
    assert_eq!(channel.send(&ProgressRecord::failure("Unable to open file")), SendOutcome::Deferred);

    // no producer activity after this point
    let received = drain(&channel);
    assert_eq!(received.len(), 2);
    assert_eq!(received[0], run(1));
    assert_eq!(received[1].status(), Some(UpdateStatus::Failure));
    assert_eq!(received[1].info(), "Unable to open file");
    assert!(!channel.has_pending());
    assert_eq!(channel.try_receive(), None);
}

#[test]
fn test_held_terminal_released_through_clone() {
    let producer = ProgressChannel::in_memory(2);
    let consumer = producer.clone();
    producer.send(&run(1));
    producer.send(&run(2));
    assert_eq!(producer.send(&ProgressRecord::new(UpdateStatus::Success)), SendOutcome::Deferred);

    let statuses: Vec<_> = drain(&consumer).iter().map(|r| r.status()).collect();
    assert_eq!(
        statuses,
        vec![Some(UpdateStatus::Run), Some(UpdateStatus::Run), Some(UpdateStatus::Success)]
    );
    assert!(!producer.has_pending());
}

#[test]
fn test_newer_terminal_replaces_pending() {
    let channel = ProgressChannel::in_memory(1);
    channel.send(&run(1));
    channel.send(&ProgressRecord::failure("first"));
    assert_eq!(channel.send(&ProgressRecord::failure("second")), SendOutcome::Deferred);

    channel.try_receive();
    channel.flush_pending();
    assert_eq!(channel.try_receive().unwrap().info(), "second");
}

#[test]
fn test_clones_share_queue() {
    let producer = ProgressChannel::in_memory(4);
    let consumer = producer.clone();

    producer.send(&run(3));
    assert_eq!(consumer.try_receive(), Some(run(3)));
}

#[test]
fn test_malformed_message_skipped() {
    let queue = Arc::new(MemoryMessageQueue::new("test", 4, RECORD_SIZE));
    queue.send(b"garbage").unwrap();
    let channel = ProgressChannel::with_queue(queue.clone());
    channel.send(&run(1));

    assert_eq!(channel.try_receive(), Some(run(1)));
    assert_eq!(queue.pending(), 0);
}

#[test]
fn test_unknown_status_survives_transport() {
    let channel = ProgressChannel::in_memory(1);
    channel.send(&ProgressRecord::from_status_code(99));

    let received = channel.try_receive().unwrap();
    assert_eq!(received.status(), None);
    assert_eq!(received.status_code(), 99);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Records sent within capacity come back in send order, then empty
    #[test]
    fn fifo_within_capacity(
        steps in prop::collection::vec((0u32..20, 0u32..20, 0u32..=100), 0..16),
    ) {
        let channel = ProgressChannel::in_memory(16);
        let records: Vec<ProgressRecord> = steps
            .iter()
            .map(|&(cur, total, pct)| {
                ProgressRecord::new(UpdateStatus::Progress).with_steps(cur, total).with_percent(pct)
            })
            .collect();

        for record in &records {
            prop_assert_eq!(channel.send(record), SendOutcome::Delivered);
        }
        prop_assert_eq!(drain(&channel), records);
        prop_assert_eq!(channel.try_receive(), None);
    }

    /// Non-terminal records sent to a full channel never show up later
    #[test]
    fn overflow_is_dropped_not_blocked(capacity in 1usize..8, extra in 1usize..8) {
        let channel = ProgressChannel::in_memory(capacity);
        for step in 0..(capacity + extra) as u32 {
            channel.send(&run(step));
        }

        let received = drain(&channel);
        prop_assert_eq!(received.len(), capacity);
        for (i, record) in received.iter().enumerate() {
            prop_assert_eq!(record.current_step(), i as u32);
        }
    }
}
