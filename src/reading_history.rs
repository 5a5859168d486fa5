use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::SensorReading;

/// Number of readings kept per channel.
pub const HISTORY_CAPACITY: usize = 20;

/// Sliding window of the most recent readings of one channel.
#[derive(Debug, Clone, Default)]
pub struct ReadingHistory {
    entries: VecDeque<SensorReading>,
    next_index: u64,
    /// Whether the newest entry still reflects the source document.
    current: bool,
    /// Store version of the last document turned into an entry.
    source_version: Option<DateTime<Utc>>,
}

impl ReadingHistory {
    /// Append a new observation, evicting the oldest once the window is full.
    pub fn push(&mut self, value: f64, observed_at: DateTime<Utc>) -> SensorReading {
        let reading = SensorReading {
            value,
            sequence_index: self.next_index,
            observed_at,
        };
        self.next_index += 1;

        if self.entries.len() == HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(reading.clone());
        self.current = true;
        reading
    }

    /// Newest entry of the window, current or not.
    pub fn latest(&self) -> Option<&SensorReading> {
        self.entries.back()
    }

    /// The reading that stands for the source document right now. `None`
    /// once the document went missing or stopped holding a number.
    pub fn current(&self) -> Option<&SensorReading> {
        self.entries.back().filter(|_| self.current)
    }

    /// Keep the window but stop reporting a current reading.
    pub fn mark_absent(&mut self) {
        self.current = false;
    }

    /// Whether a document at `version` was already turned into an entry.
    pub fn has_seen(&self, version: DateTime<Utc>) -> bool {
        self.source_version.is_some_and(|last| version <= last)
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-channel reading windows shared between the feed tasks and the API.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock` so concurrent readers never block each other.
#[derive(Clone, Default)]
pub struct HistoryBuffer {
    inner: Arc<RwLock<HashMap<String, ReadingHistory>>>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value on `channel` and return the reading as stored.
    pub async fn append(&self, channel: &str, value: f64, observed_at: DateTime<Utc>) -> SensorReading {
        self.inner
            .write()
            .await
            .entry(channel.to_owned())
            .or_default()
            .push(value, observed_at)
    }

    /// Record the value of a source document written at `version`.
    ///
    /// Returns `None` without touching the window when that document (or a
    /// newer one) was already recorded, as happens when a feed is reopened
    /// and replays the current state.
    pub async fn record(
        &self,
        channel: &str,
        value: f64,
        observed_at: DateTime<Utc>,
        version: Option<DateTime<Utc>>,
    ) -> Option<SensorReading> {
        let mut histories = self.inner.write().await;
        let history = histories.entry(channel.to_owned()).or_default();
        if let Some(version) = version {
            if history.has_seen(version) {
                return None;
            }
            history.source_version = Some(version);
        }
        Some(history.push(value, observed_at))
    }

    /// The source document of `channel` is gone or holds no number.
    pub async fn mark_absent(&self, channel: &str) {
        self.inner
            .write()
            .await
            .entry(channel.to_owned())
            .or_default()
            .mark_absent();
    }

    /// Current reading on `channel`, or `None` if it was never observed or
    /// its document is currently absent or non-numeric.
    pub async fn latest(&self, channel: &str) -> Option<SensorReading> {
        self.inner
            .read()
            .await
            .get(channel)
            .and_then(|h| h.current().cloned())
    }

    /// Snapshot of the window for `channel`, oldest first.
    pub async fn readings(&self, channel: &str) -> Vec<SensorReading> {
        self.inner
            .read()
            .await
            .get(channel)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}
