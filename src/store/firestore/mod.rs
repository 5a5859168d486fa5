pub mod models;

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use reqwest::{Client, StatusCode};
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    config::FirestoreConfig,
    errors::{FeedError, WriteError},
    store::{DocumentSnapshot, DocumentStore, Fields, SnapshotStream},
};

use self::models::{
    CommitRequest, Document, DocumentMask, ErrorResponse, FieldTransform, Precondition,
    ServerValue, Value, Write,
};

/// Firestore REST client.
///
/// Live feeds are emulated by polling the document and emitting a snapshot
/// whenever its existence or `updateTime` changes.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    http: Client,
    base_url: String,
    /// `projects/{project}/databases/{database}/documents`
    root: String,
    api_key: Option<String>,
    poll_interval: Duration,
}

impl FirestoreClient {
    pub fn new(config: &FirestoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_owned(),
                root: format!(
                    "projects/{}/databases/{}/documents",
                    config.project_id, config.database
                ),
                api_key: config.api_key.clone(),
                poll_interval: Duration::from_millis(config.poll_interval_ms),
            }),
        }
    }

    fn document_name(&self, path: &str) -> String {
        format!("{}/{}", self.inner.root, path)
    }

    fn url(&self, suffix: &str) -> String {
        let mut url = format!("{}/{}", self.inner.base_url, suffix);
        if let Some(key) = &self.inner.api_key {
            url.push_str("?key=");
            url.push_str(key);
        }
        url
    }

    /// Fetch the current state of one document. A 404 is a missing
    /// document, not an error.
    pub async fn get_document(&self, path: &str) -> Result<DocumentSnapshot, FeedError> {
        let url = self.url(&self.document_name(path));
        debug!(path = %path, "Fetching document");

        let resp = self
            .inner
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FeedError::Transport {
                path: path.to_owned(),
                message: e.to_string(),
            })?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(DocumentSnapshot::missing(path));
        }
        if !resp.status().is_success() {
            return Err(FeedError::Status {
                path: path.to_owned(),
                status: resp.status().as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| FeedError::Transport {
            path: path.to_owned(),
            message: e.to_string(),
        })?;
        let doc = serde_json::from_slice::<Document>(&bytes).map_err(|e| FeedError::Decode {
            path: path.to_owned(),
            message: e.to_string(),
        })?;

        Ok(snapshot_from_document(path, doc))
    }

    async fn commit(&self, path: &str, write: Write) -> Result<(), WriteError> {
        let url = self.url(&format!("{}:commit", self.inner.root));
        let body = CommitRequest {
            writes: vec![write],
        };
        debug!(path = %path, "Committing write");

        let resp = self
            .inner
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WriteError::Transport {
                path: path.to_owned(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let bytes = resp.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorResponse>(&bytes)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());

        Err(match status {
            StatusCode::NOT_FOUND => WriteError::NotFound(path.to_owned()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                WriteError::PermissionDenied(path.to_owned())
            }
            _ => WriteError::Rejected {
                path: path.to_owned(),
                status: status.as_u16(),
                message,
            },
        })
    }
}

impl DocumentStore for FirestoreClient {
    fn observe(&self, path: &str) -> SnapshotStream {
        let (tx, stream) = SnapshotStream::channel();
        let client = self.clone();
        let path = path.to_owned();

        tokio::spawn(async move {
            let mut ticker = time::interval(client.inner.poll_interval);
            ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
            // `None` until the first emission; then the (exists, updateTime) last sent.
            let mut last_version = None;

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = ticker.tick() => {}
                }

                match client.get_document(&path).await {
                    Ok(snapshot) => {
                        let version = Some((snapshot.exists, snapshot.update_time));
                        if version == last_version {
                            continue;
                        }
                        last_version = version;
                        if tx.send(Ok(snapshot)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(path = %path, error = %e, "Document poll failed; closing feed");
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }

            debug!(path = %path, "Firestore feed closed");
        });

        stream
    }

    async fn write(&self, path: &str, fields: Fields) -> Result<(), WriteError> {
        let write = build_write(self.document_name(path), fields, true);
        self.commit(path, write).await
    }

    async fn append(&self, collection: &str, fields: Fields) -> Result<(), WriteError> {
        let path = format!("{collection}/{}", Uuid::new_v4().simple());
        let write = build_write(self.document_name(&path), fields, false);
        self.commit(&path, write).await
    }
}

/// Split domain fields into a masked update plus server-time transforms.
///
/// `must_exist` selects update semantics (`true`) or create semantics (`false`).
fn build_write(name: String, fields: Fields, must_exist: bool) -> Write {
    let mut values = BTreeMap::new();
    let mut transforms = Vec::new();

    for (key, field) in fields {
        match Value::from_field(field) {
            Some(value) => {
                values.insert(key, value);
            }
            None => transforms.push(FieldTransform {
                field_path: key,
                set_to_server_value: ServerValue::RequestTime,
            }),
        }
    }

    Write {
        update_mask: DocumentMask {
            field_paths: values.keys().cloned().collect(),
        },
        update: Document {
            name,
            fields: values,
            create_time: None,
            update_time: None,
        },
        update_transforms: transforms,
        current_document: Precondition { exists: must_exist },
    }
}

fn snapshot_from_document(path: &str, doc: Document) -> DocumentSnapshot {
    let fields = doc
        .fields
        .into_iter()
        .filter_map(|(k, v)| v.into_field().map(|f| (k, f)))
        .collect();

    DocumentSnapshot {
        path: path.to_owned(),
        exists: true,
        fields,
        update_time: doc.update_time,
    }
}
