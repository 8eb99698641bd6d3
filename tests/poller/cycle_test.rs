//! Initialization and steady-state poll cycles.

use std::sync::Arc;

use tgwatch::poller::{
    format_message, process_batch, seed_watermark, Poller, PollerSettings, Watermark,
};
use tgwatch::telegram::Message;

use crate::mock_api::{channel, flood_wait, msg, MockApi, RecordingSink};

fn poller_with(api: Arc<MockApi>, sink: Arc<RecordingSink>, settings: PollerSettings) -> Poller {
    Poller::new(api, channel(), sink, settings)
}

/// Five messages with increasing timestamps, newest first.
fn five_newest_first() -> Vec<Message> {
    vec![
        msg(5, 500, "five"),
        msg(4, 400, "four"),
        msg(3, 300, "three"),
        msg(2, 200, "two"),
        msg(1, 100, "one"),
    ]
}

#[test]
fn seed_processes_oldest_first() {
    let mut watermark = Watermark::new();
    let sink = RecordingSink::default();

    let emitted = seed_watermark(&mut watermark, five_newest_first(), &sink);

    assert_eq!(emitted, 5);
    assert_eq!(sink.ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(watermark.last_seen_timestamp(), 500);
    assert_eq!(
        watermark.seen_ids().into_iter().collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
}

#[test]
fn seed_skips_messages_without_text() {
    let mut watermark = Watermark::new();
    let sink = RecordingSink::default();
    let batch = vec![msg(3, 300, ""), msg(2, 200, "two"), msg(1, 100, "one")];

    seed_watermark(&mut watermark, batch, &sink);

    assert_eq!(sink.ids(), vec![1, 2]);
    assert!(!watermark.has_seen(3));
    assert_eq!(watermark.last_seen_timestamp(), 200);
}

#[test]
fn steady_state_emits_only_fresh_unseen_message() {
    let mut watermark = Watermark::new();
    watermark.record(&msg(10, 1_000, "seed"));
    let sink = RecordingSink::default();

    let batch = vec![msg(12, 1_010, "fresh"), msg(11, 990, "stale")];
    let emitted = process_batch(&mut watermark, batch, &sink);

    assert_eq!(emitted, 1);
    assert_eq!(sink.ids(), vec![12]);
    assert_eq!(watermark.last_seen_timestamp(), 1_010);
}

#[test]
fn steady_state_emits_every_new_message_in_order() {
    let mut watermark = Watermark::new();
    watermark.record(&msg(10, 1_000, "seed"));
    let sink = RecordingSink::default();

    let batch = vec![
        msg(13, 1_030, "c"),
        msg(12, 1_020, "b"),
        msg(11, 1_010, "a"),
        msg(10, 1_000, "seed"),
    ];
    process_batch(&mut watermark, batch, &sink);

    assert_eq!(sink.ids(), vec![11, 12, 13]);
    assert_eq!(watermark.last_seen_timestamp(), 1_030);
}

#[test]
fn repeated_batches_never_re_emit() {
    let mut watermark = Watermark::new();
    let sink = RecordingSink::default();
    let batch = vec![msg(2, 200, "b"), msg(1, 100, "a")];

    process_batch(&mut watermark, batch.clone(), &sink);
    process_batch(&mut watermark, batch.clone(), &sink);
    process_batch(&mut watermark, batch, &sink);

    assert_eq!(sink.ids(), vec![1, 2]);
}

#[test]
fn late_message_behind_watermark_is_never_emitted() {
    let mut watermark = Watermark::new();
    watermark.record(&msg(20, 2_000, "newer"));
    let sink = RecordingSink::default();

    process_batch(&mut watermark, vec![msg(19, 1_999, "missed")], &sink);

    assert!(sink.ids().is_empty());
    assert!(!watermark.has_seen(19));
}

#[tokio::test]
async fn initialize_fetches_initial_batch_size() {
    let api = Arc::new(MockApi::new().with_history(Ok(five_newest_first())));
    let sink = Arc::new(RecordingSink::default());
    let mut poller = poller_with(Arc::clone(&api), Arc::clone(&sink), PollerSettings::default());

    let emitted = poller.initialize().await.expect("initialize should succeed");

    assert_eq!(emitted, 5);
    assert_eq!(api.history_limits(), vec![5]);
    assert_eq!(poller.watermark().last_seen_timestamp(), 500);
}

#[tokio::test]
async fn initialize_failure_leaves_watermark_empty() {
    let api = Arc::new(MockApi::new().with_history(Err(flood_wait())));
    let sink = Arc::new(RecordingSink::default());
    let mut poller = poller_with(api, Arc::clone(&sink), PollerSettings::default());

    assert!(poller.initialize().await.is_err());
    assert_eq!(poller.watermark(), &Watermark::new());
    assert!(sink.ids().is_empty());
}

#[tokio::test]
async fn poll_once_uses_poll_batch_size() {
    let api = Arc::new(
        MockApi::new()
            .with_history(Ok(five_newest_first()))
            .with_history(Ok(vec![msg(6, 600, "six")])),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut poller = poller_with(Arc::clone(&api), Arc::clone(&sink), PollerSettings::default());

    poller.initialize().await.expect("initialize should succeed");
    let emitted = poller.poll_once().await.expect("poll should succeed");

    assert_eq!(emitted, 1);
    assert_eq!(api.history_limits(), vec![5, 100]);
    assert_eq!(sink.ids(), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn failed_cycle_does_not_touch_watermark() {
    let api = Arc::new(
        MockApi::new()
            .with_history(Ok(five_newest_first()))
            .with_history(Err(flood_wait()))
            .with_history(Ok(vec![msg(6, 600, "six"), msg(5, 500, "five")])),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut poller = poller_with(Arc::clone(&api), Arc::clone(&sink), PollerSettings::default());
    poller.initialize().await.expect("initialize should succeed");
    let before = poller.watermark().clone();

    let emitted = poller.run_cycle().await;
    assert_eq!(emitted, 0);
    assert_eq!(poller.watermark(), &before);

    let emitted = poller.run_cycle().await;
    assert_eq!(emitted, 1);
    assert_eq!(sink.ids(), vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn last_seen_is_monotonic_across_cycles() {
    let api = Arc::new(
        MockApi::new()
            .with_history(Ok(vec![msg(2, 200, "b"), msg(1, 100, "a")]))
            .with_history(Ok(vec![msg(3, 150, "late")]))
            .with_history(Ok(vec![msg(4, 300, "d")]))
            .with_history(Ok(Vec::new())),
    );
    let sink = Arc::new(RecordingSink::default());
    let mut poller = poller_with(api, sink, PollerSettings::default());
    poller.initialize().await.expect("initialize should succeed");

    let mut previous = poller.watermark().last_seen_timestamp();
    for _ in 0..3 {
        poller.run_cycle().await;
        let current = poller.watermark().last_seen_timestamp();
        assert!(current >= previous, "watermark moved back: {previous} -> {current}");
        previous = current;
    }
    assert_eq!(previous, 300);
}

#[tokio::test]
async fn retention_bounds_seen_ids() {
    let api = Arc::new(
        MockApi::new()
            .with_history(Ok(vec![msg(2, 200, "b"), msg(1, 100, "a")]))
            .with_history(Ok(vec![msg(3, 10_000, "c")])),
    );
    let sink = Arc::new(RecordingSink::default());
    let settings = PollerSettings {
        seen_retention: Some(3_600),
        ..PollerSettings::default()
    };
    let mut poller = poller_with(api, sink, settings);
    poller.initialize().await.expect("initialize should succeed");
    assert_eq!(poller.watermark().seen_count(), 2);

    poller.poll_once().await.expect("poll should succeed");

    assert_eq!(poller.watermark().seen_ids().into_iter().collect::<Vec<_>>(), vec![3]);
}

#[test]
fn console_line_includes_text_and_sender() {
    assert_eq!(format_message(&msg(3, 300, "hello")), "Message: hello, sender id: 30");

    let channel_post = Message {
        id: 4,
        timestamp: 400,
        text: Some("post".to_owned()),
        sender_id: None,
    };
    assert_eq!(format_message(&channel_post), "Message: post, sender id: unknown");
}
