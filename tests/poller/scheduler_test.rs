//! Fixed-interval scheduling with paused Tokio time.

use std::sync::Arc;
use std::time::Duration;

use tgwatch::poller::scheduler::PollerHandle;
use tgwatch::poller::{Poller, PollerSettings};

use crate::mock_api::{channel, flood_wait, msg, MockApi, RecordingSink};

fn make_poller(api: Arc<MockApi>, sink: Arc<RecordingSink>) -> Poller {
    Poller::new(api, channel(), sink, PollerSettings::default())
}

#[tokio::test(start_paused = true)]
async fn cycles_fire_once_per_period() {
    let api = Arc::new(MockApi::new());
    let sink = Arc::new(RecordingSink::default());
    let poller = make_poller(Arc::clone(&api), sink);

    let handle = PollerHandle::start(poller, Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(35)).await;
    handle.stop().await.expect("poller task should join");

    assert_eq!(api.history_limits(), vec![100, 100, 100]);
}

#[tokio::test(start_paused = true)]
async fn failing_cycles_keep_the_timer_running() {
    let api = Arc::new(
        MockApi::new()
            .with_history(Err(flood_wait()))
            .with_history(Err(flood_wait()))
            .with_history(Ok(vec![msg(1, 100, "after errors")])),
    );
    let sink = Arc::new(RecordingSink::default());
    let poller = make_poller(Arc::clone(&api), Arc::clone(&sink));

    let handle = PollerHandle::start(poller, Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(31)).await;
    let poller = handle.stop().await.expect("poller task should join");

    assert_eq!(sink.ids(), vec![1]);
    assert_eq!(poller.watermark().last_seen_timestamp(), 100);
}

#[tokio::test(start_paused = true)]
async fn stop_before_first_tick_runs_no_cycle() {
    let api = Arc::new(MockApi::new());
    let sink = Arc::new(RecordingSink::default());
    let poller = make_poller(Arc::clone(&api), sink);

    let handle = PollerHandle::start(poller, Duration::from_secs(10));
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!handle.is_finished());
    handle.stop().await.expect("poller task should join");

    assert!(api.history_limits().is_empty());
}
