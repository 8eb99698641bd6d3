//! Fixed-interval scheduling for the [`Poller`].
//!
//! One Tokio task owns the poller and awaits each cycle inline, so two cycles
//! never run at once. Ticks that fall due while a cycle is still running are
//! skipped rather than queued.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use super::Poller;

/// Run poll cycles every `period` until `shutdown_rx` turns `true` or its
/// sender is dropped. Returns the poller so its state can be inspected.
///
/// The first cycle fires one full period after the call; the caller is
/// expected to have seeded the watermark already.
pub async fn run_poller(
    mut poller: Poller,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Poller {
    info!(
        channel_id = poller.channel().id,
        period_secs = period.as_secs(),
        "poller started"
    );

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first immediate tick.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                poller.run_cycle().await;
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("poller shutting down");
                    break;
                }
            }
        }
    }

    info!(
        seen = poller.watermark().seen_count(),
        last_seen = poller.watermark().last_seen_timestamp(),
        "poller stopped"
    );
    poller
}

/// A running poller task with an explicit stop.
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Poller>,
}

impl PollerHandle {
    /// Spawn [`run_poller`] on the current runtime.
    pub fn start(poller: Poller, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_poller(poller, period, shutdown_rx));
        Self { shutdown_tx, task }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the in-flight cycle, if any, to finish.
    ///
    /// # Errors
    ///
    /// Returns a [`tokio::task::JoinError`] if the task panicked.
    pub async fn stop(self) -> Result<Poller, tokio::task::JoinError> {
        // A send error means the task already exited; join reports why.
        let _ = self.shutdown_tx.send(true);
        self.task.await
    }
}
