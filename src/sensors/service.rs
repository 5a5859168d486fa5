use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::{
    channels::SensorChannel,
    models::SensorReading,
    reading_history::HistoryBuffer,
    store::{archive_collection, DocumentSnapshot, DocumentStore, FieldValue, Fields},
};

/// Field holding the measured value in a sensor document.
pub const VALUE_FIELD: &str = "value";
/// Field holding the device-side observation time in a sensor document.
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// What a sensor snapshot amounts to once normalized.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorSample {
    /// No document yet: "no data", not an error.
    Missing,
    /// Document exists but `value` is absent or not a number.
    NonNumeric,
    Value {
        value: f64,
        observed_at: DateTime<Utc>,
    },
}

/// Normalize a raw sensor document.
///
/// `observed_at` prefers the document's own `timestamp` field, then the
/// store's update time, then `now`.
pub fn normalize(snapshot: &DocumentSnapshot, now: DateTime<Utc>) -> SensorSample {
    if !snapshot.exists {
        return SensorSample::Missing;
    }

    let Some(value) = snapshot
        .get(VALUE_FIELD)
        .and_then(FieldValue::as_f64)
        .filter(|v| v.is_finite())
    else {
        return SensorSample::NonNumeric;
    };

    let observed_at = snapshot
        .get(TIMESTAMP_FIELD)
        .and_then(FieldValue::as_timestamp)
        .or(snapshot.update_time)
        .unwrap_or(now);

    SensorSample::Value { value, observed_at }
}

/// Turns sensor snapshots into history entries and archives every value.
#[derive(Clone)]
pub struct SensorService<S> {
    store: S,
    history: HistoryBuffer,
    archive: bool,
}

impl<S: DocumentStore> SensorService<S> {
    pub fn new(store: S, history: HistoryBuffer, archive: bool) -> Self {
        Self {
            store,
            history,
            archive,
        }
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Apply one snapshot of `channel`. Returns the reading appended, if any.
    ///
    /// A missing or non-numeric document leaves the channel without a
    /// current reading. A document already recorded is not recorded again.
    pub async fn apply_snapshot(
        &self,
        channel: &SensorChannel,
        snapshot: &DocumentSnapshot,
    ) -> Option<SensorReading> {
        match normalize(snapshot, Utc::now()) {
            SensorSample::Missing => {
                warn!(channel = %channel.id, "No data yet for sensor");
                self.history.mark_absent(&channel.id).await;
                None
            }
            SensorSample::NonNumeric => {
                warn!(channel = %channel.id, "Sensor document has no numeric value; ignoring");
                self.history.mark_absent(&channel.id).await;
                None
            }
            SensorSample::Value { value, observed_at } => {
                let Some(reading) = self
                    .history
                    .record(&channel.id, value, observed_at, snapshot.update_time)
                    .await
                else {
                    debug!(channel = %channel.id, "Sensor document already recorded; skipping");
                    return None;
                };
                debug!(
                    channel = %channel.id,
                    kind = %channel.kind,
                    value,
                    sequence_index = reading.sequence_index,
                    "Sensor reading recorded"
                );
                if self.archive {
                    self.archive_value(&channel.id, value);
                }
                Some(reading)
            }
        }
    }

    /// Append `value` to the channel's archive collection.
    ///
    /// Runs detached: tearing down the feed must not cancel the write.
    fn archive_value(&self, channel: &str, value: f64) {
        let store = self.store.clone();
        let collection = archive_collection(channel);
        let channel = channel.to_owned();
        let fields = Fields::from([
            (VALUE_FIELD.to_owned(), FieldValue::Double(value)),
            (TIMESTAMP_FIELD.to_owned(), FieldValue::ServerTimestamp),
        ]);

        tokio::spawn(async move {
            if let Err(e) = store.append(&collection, fields).await {
                error!(channel = %channel, error = %e, "Failed to archive sensor reading");
            }
        });
    }
}
