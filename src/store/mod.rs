//! Document Feed Store: the live document database behind the dashboard.
//!
//! Only three operations are needed: observe one document, merge fields into
//! one document, and append a document to a collection.

pub mod firestore;
pub mod memory;

use std::{collections::BTreeMap, future::Future};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::errors::{FeedError, WriteError};

pub use self::{firestore::FirestoreClient, memory::MemoryStore};

pub const SENSOR_COLLECTION: &str = "sensorData";
pub const ACTUATOR_COLLECTION: &str = "controlMod";
pub const ARCHIVE_SUBCOLLECTION: &str = "historicalData";

pub fn sensor_path(id: &str) -> String {
    format!("{SENSOR_COLLECTION}/{id}")
}

pub fn actuator_path(id: &str) -> String {
    format!("{ACTUATOR_COLLECTION}/{id}")
}

/// Append-only collection holding every value ever observed on a sensor.
pub fn archive_collection(id: &str) -> String {
    format!("{SENSOR_COLLECTION}/{id}/{ARCHIVE_SUBCOLLECTION}")
}

/// A single document field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    /// Write-only: replaced by the store's clock when the write commits.
    ServerTimestamp,
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }
}

pub type Fields = BTreeMap<String, FieldValue>;

/// State of one document at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub path: String,
    pub exists: bool,
    pub fields: Fields,
    /// Server-assigned time of the last change, when the store reports one.
    pub update_time: Option<DateTime<Utc>>,
}

impl DocumentSnapshot {
    pub fn missing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            exists: false,
            fields: Fields::new(),
            update_time: None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }
}

/// Unbounded sequence of snapshots for one document.
///
/// Ends after an error or when the producer shuts down. Dropping the stream
/// tells the producer to stop.
#[derive(Debug)]
pub struct SnapshotStream {
    rx: mpsc::UnboundedReceiver<Result<DocumentSnapshot, FeedError>>,
}

pub(crate) type SnapshotSender = mpsc::UnboundedSender<Result<DocumentSnapshot, FeedError>>;

impl SnapshotStream {
    pub(crate) fn channel() -> (SnapshotSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    pub async fn next(&mut self) -> Option<Result<DocumentSnapshot, FeedError>> {
        self.rx.recv().await
    }
}

pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Start a live feed on the document at `path`. The current state is the
    /// first item.
    fn observe(&self, path: &str) -> SnapshotStream;

    /// Merge `fields` into the existing document at `path`. Fields not named
    /// are left untouched.
    fn write(&self, path: &str, fields: Fields) -> impl Future<Output = Result<(), WriteError>> + Send;

    /// Create a new document with a generated id under `collection`.
    fn append(
        &self,
        collection: &str,
        fields: Fields,
    ) -> impl Future<Output = Result<(), WriteError>> + Send;
}

/// The backend selected at startup.
#[derive(Debug, Clone)]
pub enum Store {
    Firestore(FirestoreClient),
    Memory(MemoryStore),
}

impl DocumentStore for Store {
    fn observe(&self, path: &str) -> SnapshotStream {
        match self {
            Store::Firestore(s) => s.observe(path),
            Store::Memory(s) => s.observe(path),
        }
    }

    async fn write(&self, path: &str, fields: Fields) -> Result<(), WriteError> {
        match self {
            Store::Firestore(s) => s.write(path, fields).await,
            Store::Memory(s) => s.write(path, fields).await,
        }
    }

    async fn append(&self, collection: &str, fields: Fields) -> Result<(), WriteError> {
        match self {
            Store::Firestore(s) => s.append(collection, fields).await,
            Store::Memory(s) => s.append(collection, fields).await,
        }
    }
}
