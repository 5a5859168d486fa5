use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;
use uuid::Uuid;

use super::{DocumentSnapshot, DocumentStore, FieldValue, Fields, SnapshotSender, SnapshotStream};
use crate::errors::{FeedError, WriteError};

/// In-process document store with live feeds.
///
/// Used for local development (`STORE_BACKEND=memory`) and in tests. Every
/// write to a path is pushed to every open feed on that path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<String, Document>,
    watchers: HashMap<String, Vec<SnapshotSender>>,
    write_failure: Option<WriteError>,
    created: u64,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct Document {
    fields: Fields,
    update_time: DateTime<Utc>,
    created: u64,
}

impl State {
    fn snapshot(&self, path: &str) -> DocumentSnapshot {
        match self.documents.get(path) {
            Some(doc) => DocumentSnapshot {
                path: path.to_owned(),
                exists: true,
                fields: doc.fields.clone(),
                update_time: Some(doc.update_time),
            },
            None => DocumentSnapshot::missing(path),
        }
    }

    fn notify(&mut self, path: &str) {
        let snapshot = self.snapshot(path);
        if let Some(senders) = self.watchers.get_mut(path) {
            senders.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        }
    }

    /// Update times strictly increase, like a real store's document versions.
    fn tick(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_update {
            if now <= last {
                now = last + TimeDelta::nanoseconds(1);
            }
        }
        self.last_update = Some(now);
        now
    }

    fn store(&mut self, path: &str, fields: Fields) {
        let now = self.tick();
        let created = match self.documents.get(path) {
            Some(doc) => doc.created,
            None => {
                self.created += 1;
                self.created
            }
        };
        self.documents.insert(
            path.to_owned(),
            Document {
                fields: resolve_server_timestamps(fields, now),
                update_time: now,
                created,
            },
        );
        self.notify(path);
    }
}

fn resolve_server_timestamps(fields: Fields, now: DateTime<Utc>) -> Fields {
    fields
        .into_iter()
        .map(|(k, v)| match v {
            FieldValue::ServerTimestamp => (k, FieldValue::Timestamp(now)),
            other => (k, other),
        })
        .collect()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the whole document at `path`, as another client would.
    pub fn put(&self, path: &str, fields: Fields) {
        self.lock().store(path, fields);
    }

    /// Delete the document at `path`. Open feeds see it go missing.
    pub fn remove(&self, path: &str) {
        let mut state = self.lock();
        if state.documents.remove(path).is_some() {
            state.notify(path);
        }
    }

    /// Current fields of the document at `path`.
    pub fn get(&self, path: &str) -> Option<Fields> {
        self.lock().documents.get(path).map(|d| d.fields.clone())
    }

    /// Documents directly under `collection`, in creation order.
    pub fn collection(&self, collection: &str) -> Vec<Fields> {
        let prefix = format!("{collection}/");
        let state = self.lock();
        let mut docs: Vec<&Document> = state
            .documents
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.contains('/'))
            })
            .map(|(_, doc)| doc)
            .collect();
        docs.sort_by_key(|d| d.created);
        docs.into_iter().map(|d| d.fields.clone()).collect()
    }

    /// Make every subsequent write and append fail with `error` (`None` clears).
    pub fn fail_writes(&self, error: Option<WriteError>) {
        self.lock().write_failure = error;
    }

    /// Terminate every open feed on `path` with a fault.
    pub fn inject_fault(&self, path: &str, message: &str) {
        let mut state = self.lock();
        if let Some(senders) = state.watchers.remove(path) {
            let error = FeedError::Injected {
                path: path.to_owned(),
                message: message.to_owned(),
            };
            for tx in senders {
                let _ = tx.send(Err(error.clone()));
            }
        }
    }

    /// Number of feeds on `path` whose consumer is still listening.
    pub fn open_feeds(&self, path: &str) -> usize {
        self.lock()
            .watchers
            .get(path)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn observe(&self, path: &str) -> SnapshotStream {
        let (tx, stream) = SnapshotStream::channel();
        let mut state = self.lock();
        let _ = tx.send(Ok(state.snapshot(path)));
        let senders = state.watchers.entry(path.to_owned()).or_default();
        senders.retain(|tx| !tx.is_closed());
        senders.push(tx);
        debug!(path = %path, "memory store: feed opened");
        stream
    }

    async fn write(&self, path: &str, fields: Fields) -> Result<(), WriteError> {
        let mut state = self.lock();
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }

        let mut merged = state
            .documents
            .get(path)
            .map(|d| d.fields.clone())
            .ok_or_else(|| WriteError::NotFound(path.to_owned()))?;
        merged.extend(fields);
        state.store(path, merged);
        debug!(path = %path, "memory store: document updated");
        Ok(())
    }

    async fn append(&self, collection: &str, fields: Fields) -> Result<(), WriteError> {
        let mut state = self.lock();
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }

        let path = format!("{collection}/{}", Uuid::new_v4().simple());
        state.store(&path, fields);
        debug!(path = %path, "memory store: document appended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, FieldValue)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn observe_emits_current_state_first() {
        let store = MemoryStore::new();
        store.put("sensorData/gas", fields(&[("value", FieldValue::Double(420.0))]));

        let mut feed = store.observe("sensorData/gas");
        let snap = feed.next().await.unwrap().unwrap();
        assert!(snap.exists);
        assert_eq!(snap.get("value"), Some(&FieldValue::Double(420.0)));
        assert!(snap.update_time.is_some());
    }

    #[tokio::test]
    async fn observe_missing_document_reports_absence() {
        let store = MemoryStore::new();
        let mut feed = store.observe("sensorData/gas");
        let snap = feed.next().await.unwrap().unwrap();
        assert!(!snap.exists);
    }

    #[tokio::test]
    async fn write_merges_and_notifies() {
        let store = MemoryStore::new();
        store.put(
            "controlMod/Pump",
            fields(&[
                ("status", FieldValue::Bool(true)),
                ("turnedOnTimestamp", FieldValue::Timestamp(Utc::now())),
            ]),
        );
        let mut feed = store.observe("controlMod/Pump");
        feed.next().await.unwrap().unwrap();

        store
            .write("controlMod/Pump", fields(&[("status", FieldValue::Bool(false))]))
            .await
            .unwrap();

        let snap = feed.next().await.unwrap().unwrap();
        assert_eq!(snap.get("status"), Some(&FieldValue::Bool(false)));
        assert!(matches!(snap.get("turnedOnTimestamp"), Some(FieldValue::Timestamp(_))));
    }

    #[tokio::test]
    async fn write_to_missing_document_fails() {
        let store = MemoryStore::new();
        let err = store
            .write("controlMod/Efan", fields(&[("status", FieldValue::Bool(true))]))
            .await
            .unwrap_err();
        assert_eq!(err, WriteError::NotFound("controlMod/Efan".into()));
    }

    #[tokio::test]
    async fn server_timestamps_are_resolved() {
        let store = MemoryStore::new();
        store.put("controlMod/Efan", Fields::new());
        store
            .write(
                "controlMod/Efan",
                fields(&[("turnedOnTimestamp", FieldValue::ServerTimestamp)]),
            )
            .await
            .unwrap();

        let doc = store.get("controlMod/Efan").unwrap();
        assert!(matches!(doc["turnedOnTimestamp"], FieldValue::Timestamp(_)));
    }

    #[tokio::test]
    async fn append_preserves_creation_order() {
        let store = MemoryStore::new();
        for v in [1.0, 2.0, 3.0] {
            store
                .append("sensorData/gas/historicalData", fields(&[("value", FieldValue::Double(v))]))
                .await
                .unwrap();
        }
        store.put("sensorData/gas", fields(&[("value", FieldValue::Double(9.0))]));

        let values: Vec<f64> = store
            .collection("sensorData/gas/historicalData")
            .iter()
            .filter_map(|f| f["value"].as_f64())
            .collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[tokio::test]
    async fn failing_writes_leave_documents_untouched() {
        let store = MemoryStore::new();
        store.put("controlMod/Efan", fields(&[("status", FieldValue::Bool(false))]));
        store.fail_writes(Some(WriteError::PermissionDenied("controlMod/Efan".into())));

        let err = store
            .write("controlMod/Efan", fields(&[("status", FieldValue::Bool(true))]))
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::PermissionDenied(_)));
        assert_eq!(store.get("controlMod/Efan").unwrap()["status"], FieldValue::Bool(false));
    }

    #[tokio::test]
    async fn injected_fault_ends_the_feed() {
        let store = MemoryStore::new();
        let mut feed = store.observe("sensorData/gas");
        feed.next().await.unwrap().unwrap();

        store.inject_fault("sensorData/gas", "permission-denied");

        assert!(matches!(feed.next().await, Some(Err(FeedError::Injected { .. }))));
        assert!(feed.next().await.is_none());
    }

    #[test]
    fn update_times_strictly_increase() {
        let store = MemoryStore::new();
        let mut last = None;
        for v in 0..50 {
            store.put("sensorData/gas", fields(&[("value", FieldValue::Integer(v))]));
            let now = store.lock().documents["sensorData/gas"].update_time;
            assert!(last.map_or(true, |l| now > l));
            last = Some(now);
        }
    }

    #[tokio::test]
    async fn reopening_a_feed_drops_closed_ones() {
        let store = MemoryStore::new();
        for _ in 0..5 {
            drop(store.observe("sensorData/gas"));
        }
        let _feed = store.observe("sensorData/gas");
        assert_eq!(store.lock().watchers["sensorData/gas"].len(), 1);
    }

    #[tokio::test]
    async fn dropped_feeds_are_not_counted() {
        let store = MemoryStore::new();
        let feed = store.observe("sensorData/gas");
        assert_eq!(store.open_feeds("sensorData/gas"), 1);
        drop(feed);
        assert_eq!(store.open_feeds("sensorData/gas"), 0);
    }
}
