//! Message poller: watermark state, batch filtering, and emission.
//!
//! A [`Watermark`] records the newest timestamp emitted so far and the ids
//! already emitted. A message is emitted when it is newer than the watermark
//! and its id is unseen. Both batch paths process messages oldest-first.
//!
//! Known limitation: a message older than the watermark that was never
//! emitted (for example one that landed while a cycle was failing and was
//! then overtaken by a newer message) is never emitted, because the
//! timestamp check rejects it before the id set is consulted.

pub mod scheduler;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::telegram::{ChannelHandle, Message, TelegramApi, TelegramError};

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Last-seen timestamp plus the ids already emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    last_seen: i64,
    /// Emitted id mapped to its message timestamp, used for pruning.
    seen: HashMap<i64, i64>,
}

impl Watermark {
    /// Empty watermark at timestamp zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Timestamp of the newest emitted message.
    pub fn last_seen_timestamp(&self) -> i64 {
        self.last_seen
    }

    /// Whether `id` has already been emitted.
    pub fn has_seen(&self, id: i64) -> bool {
        self.seen.contains_key(&id)
    }

    /// Number of ids currently tracked.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Snapshot of the tracked ids in ascending order.
    pub fn seen_ids(&self) -> BTreeSet<i64> {
        self.seen.keys().copied().collect()
    }

    /// Whether a steady-state message passes the filter.
    pub fn accepts(&self, message: &Message) -> bool {
        message.timestamp > self.last_seen && !self.has_seen(message.id)
    }

    /// Record `message` as emitted. The timestamp never moves backwards.
    pub fn record(&mut self, message: &Message) {
        self.seen.insert(message.id, message.timestamp);
        self.last_seen = self.last_seen.max(message.timestamp);
    }

    /// Drop ids whose message is more than `retention` seconds older than
    /// the watermark. Returns how many were dropped.
    ///
    /// Every dropped id belongs to a message at or below the watermark, which
    /// the timestamp check already rejects, so pruning cannot cause a
    /// re-emission.
    pub fn prune(&mut self, retention: i64) -> usize {
        let cutoff = self.last_seen.saturating_sub(retention);
        let before = self.seen.len();
        self.seen.retain(|_, timestamp| *timestamp >= cutoff);
        before.saturating_sub(self.seen.len())
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Receives every emitted message.
pub trait MessageSink: Send + Sync {
    /// Handle one emitted message.
    fn emit(&self, message: &Message);
}

/// Render a message as the console line printed for it.
pub fn format_message(message: &Message) -> String {
    let text = message.text.as_deref().unwrap_or_default();
    match message.sender_id {
        Some(sender) => format!("Message: {text}, sender id: {sender}"),
        None => format!("Message: {text}, sender id: unknown"),
    }
}

/// Prints each message to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl MessageSink for ConsoleSink {
    fn emit(&self, message: &Message) {
        let sent_at = chrono::DateTime::from_timestamp(message.timestamp, 0)
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| message.timestamp.to_string());
        debug!(message_id = message.id, %sent_at, "emitting message");
        println!("{}", format_message(message));
    }
}

// ---------------------------------------------------------------------------
// Batch processing
// ---------------------------------------------------------------------------

/// Put a newest-first history batch into chronological order.
fn chronological(mut batch: Vec<Message>) -> Vec<Message> {
    batch.reverse();
    batch
}

/// Seed `watermark` from the initial batch.
///
/// `batch` is in the order the history call returns it (newest first). Every
/// message with non-empty text is recorded and emitted, oldest first.
/// Returns the number emitted.
pub fn seed_watermark(
    watermark: &mut Watermark,
    batch: Vec<Message>,
    sink: &dyn MessageSink,
) -> usize {
    let mut emitted: usize = 0;
    for message in chronological(batch).iter().filter(|m| m.has_text()) {
        watermark.record(message);
        sink.emit(message);
        emitted = emitted.saturating_add(1);
    }
    emitted
}

/// Filter a steady-state batch against `watermark`, emitting survivors.
///
/// `batch` is in the order the history call returns it (newest first); it
/// is processed oldest first so every new message in the batch is emitted.
/// Returns the number emitted.
pub fn process_batch(
    watermark: &mut Watermark,
    batch: Vec<Message>,
    sink: &dyn MessageSink,
) -> usize {
    let mut emitted: usize = 0;
    for message in chronological(batch) {
        if !watermark.accepts(&message) {
            continue;
        }
        watermark.record(&message);
        sink.emit(&message);
        emitted = emitted.saturating_add(1);
    }
    emitted
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Batch sizes and retention for a [`Poller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Messages fetched to seed the watermark.
    pub initial_batch: u32,
    /// Messages fetched per cycle.
    pub poll_batch: u32,
    /// Seen-id retention behind the watermark in seconds; `None` keeps all.
    pub seen_retention: Option<i64>,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            initial_batch: 5,
            poll_batch: 100,
            seen_retention: None,
        }
    }
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            initial_batch: config.initial_batch,
            poll_batch: config.poll_batch,
            seen_retention: config.seen_retention(),
        }
    }
}

/// Owns the watermark for one channel and drives fetch-filter-emit cycles.
pub struct Poller {
    api: Arc<dyn TelegramApi>,
    channel: ChannelHandle,
    sink: Arc<dyn MessageSink>,
    settings: PollerSettings,
    watermark: Watermark,
}

impl Poller {
    /// Create a poller with an empty watermark.
    pub fn new(
        api: Arc<dyn TelegramApi>,
        channel: ChannelHandle,
        sink: Arc<dyn MessageSink>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            api,
            channel,
            sink,
            settings,
            watermark: Watermark::new(),
        }
    }

    /// Current watermark state.
    pub fn watermark(&self) -> &Watermark {
        &self.watermark
    }

    /// Channel being polled.
    pub fn channel(&self) -> &ChannelHandle {
        &self.channel
    }

    /// Fetch the initial batch and seed the watermark from it.
    ///
    /// # Errors
    ///
    /// Returns the history call's error; the watermark is left untouched.
    pub async fn initialize(&mut self) -> Result<usize, TelegramError> {
        let batch = self
            .api
            .get_history(&self.channel, self.settings.initial_batch)
            .await?;
        let emitted = seed_watermark(&mut self.watermark, batch, self.sink.as_ref());
        info!(
            channel_id = self.channel.id,
            emitted,
            last_seen = self.watermark.last_seen_timestamp(),
            "watermark initialised"
        );
        Ok(emitted)
    }

    /// Fetch one batch and emit the messages that pass the filter.
    ///
    /// # Errors
    ///
    /// Returns the history call's error; the watermark is left untouched.
    pub async fn poll_once(&mut self) -> Result<usize, TelegramError> {
        let batch = self
            .api
            .get_history(&self.channel, self.settings.poll_batch)
            .await?;
        let fetched = batch.len();
        let emitted = process_batch(&mut self.watermark, batch, self.sink.as_ref());

        if let Some(retention) = self.settings.seen_retention {
            let pruned = self.watermark.prune(retention);
            if pruned > 0 {
                debug!(pruned, remaining = self.watermark.seen_count(), "pruned seen ids");
            }
        }

        debug!(fetched, emitted, "poll cycle complete");
        Ok(emitted)
    }

    /// Run one cycle, logging and swallowing any failure.
    ///
    /// Returns the number of messages emitted, zero when the cycle failed.
    pub async fn run_cycle(&mut self) -> usize {
        match self.poll_once().await {
            Ok(emitted) => emitted,
            Err(e) => {
                warn!(channel_id = self.channel.id, error = %e, "poll cycle failed, skipping");
                0
            }
        }
    }
}
