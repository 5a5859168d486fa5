mod service;

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    models::ActuatorStatus,
    store::{DocumentSnapshot, FieldValue},
};

pub use service::ActuatorControl;

/// On/off flag in an actuator document.
pub const STATUS_FIELD: &str = "status";
/// Time of the last off→on transition in an actuator document.
pub const TURNED_ON_FIELD: &str = "turnedOnTimestamp";

/// Locally confirmed actuator states, keyed by actuator id.
///
/// Only ever written from store snapshots: the store is the single authority.
#[derive(Clone, Default)]
pub struct ActuatorBoard {
    inner: Arc<RwLock<BTreeMap<String, ActuatorStatus>>>,
}

impl ActuatorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bring the local view of `id` in line with `snapshot`.
    ///
    /// A missing document creates an implicit "off" entry if none exists yet;
    /// an existing document replaces whatever was held locally.
    pub async fn reconcile(&self, id: &str, snapshot: &DocumentSnapshot) -> ActuatorStatus {
        let mut board = self.inner.write().await;

        if !snapshot.exists {
            return board.entry(id.to_owned()).or_default().clone();
        }

        let status = ActuatorStatus {
            is_on: snapshot
                .get(STATUS_FIELD)
                .and_then(FieldValue::as_bool)
                .unwrap_or(false),
            turned_on_at: snapshot
                .get(TURNED_ON_FIELD)
                .and_then(FieldValue::as_timestamp),
        };
        debug!(actuator = %id, is_on = status.is_on, "Actuator state confirmed");
        board.insert(id.to_owned(), status.clone());
        status
    }

    pub async fn get(&self, id: &str) -> Option<ActuatorStatus> {
        self.inner.read().await.get(id).cloned()
    }

    /// Every known actuator, ordered by id.
    pub async fn all(&self) -> Vec<(String, ActuatorStatus)> {
        self.inner
            .read()
            .await
            .iter()
            .map(|(id, s)| (id.clone(), s.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::Fields;

    fn snapshot(fields: Fields) -> DocumentSnapshot {
        DocumentSnapshot {
            path: "controlMod/Pump".into(),
            exists: true,
            fields,
            update_time: Some(Utc::now()),
        }
    }

    #[tokio::test]
    async fn missing_document_implies_off() {
        let board = ActuatorBoard::new();
        let status = board
            .reconcile("Pump", &DocumentSnapshot::missing("controlMod/Pump"))
            .await;
        assert_eq!(status, ActuatorStatus::default());
        assert_eq!(board.get("Pump").await, Some(ActuatorStatus::default()));
    }

    #[tokio::test]
    async fn missing_document_keeps_known_state() {
        let board = ActuatorBoard::new();
        board
            .reconcile("Pump", &snapshot(Fields::from([(STATUS_FIELD.to_owned(), FieldValue::Bool(true))])))
            .await;

        let status = board
            .reconcile("Pump", &DocumentSnapshot::missing("controlMod/Pump"))
            .await;
        assert!(status.is_on);
    }

    #[tokio::test]
    async fn source_state_replaces_local_state() {
        let board = ActuatorBoard::new();
        let on_at = Utc::now();
        board
            .reconcile(
                "Pump",
                &snapshot(Fields::from([
                    (STATUS_FIELD.to_owned(), FieldValue::Bool(true)),
                    (TURNED_ON_FIELD.to_owned(), FieldValue::Timestamp(on_at)),
                ])),
            )
            .await;

        // Another client switched it off; activation time stays in the document.
        let status = board
            .reconcile(
                "Pump",
                &snapshot(Fields::from([
                    (STATUS_FIELD.to_owned(), FieldValue::Bool(false)),
                    (TURNED_ON_FIELD.to_owned(), FieldValue::Timestamp(on_at)),
                ])),
            )
            .await;

        assert!(!status.is_on);
        assert_eq!(status.turned_on_at, Some(on_at));
    }

    #[tokio::test]
    async fn all_is_sorted_by_id() {
        let board = ActuatorBoard::new();
        for id in ["Pump", "Efan", "Svalve1"] {
            board.reconcile(id, &DocumentSnapshot::missing(id)).await;
        }
        let ids: Vec<String> = board.all().await.into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["Efan", "Pump", "Svalve1"]);
    }
}
