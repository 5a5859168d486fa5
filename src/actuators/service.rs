use std::sync::Arc;

use tracing::{error, info};

use super::{ActuatorBoard, STATUS_FIELD, TURNED_ON_FIELD};
use crate::{
    errors::WriteError,
    store::{actuator_path, DocumentStore, FieldValue, Fields},
};

/// Issues on/off requests for actuators.
///
/// Writes never touch the local [`ActuatorBoard`]; the new state shows up
/// once the store reports it through the actuator's feed.
#[derive(Clone)]
pub struct ActuatorControl<S> {
    store: S,
    board: ActuatorBoard,
    actuators: Arc<[String]>,
}

impl<S: DocumentStore> ActuatorControl<S> {
    pub fn new(store: S, board: ActuatorBoard, actuators: &[String]) -> Self {
        Self {
            store,
            board,
            actuators: actuators.into(),
        }
    }

    /// Request `id` to be on or off.
    ///
    /// Turning on also stamps the activation time with the store's clock.
    /// Turning off writes only the flag, so the last activation time is kept.
    pub async fn set_actuator(&self, id: &str, desired_on: bool) -> Result<(), WriteError> {
        if !self.actuators.iter().any(|a| a == id) {
            return Err(WriteError::UnknownChannel(id.to_owned()));
        }

        let mut fields = Fields::from([(STATUS_FIELD.to_owned(), FieldValue::Bool(desired_on))]);
        if desired_on {
            fields.insert(TURNED_ON_FIELD.to_owned(), FieldValue::ServerTimestamp);
        }

        match self.store.write(&actuator_path(id), fields).await {
            Ok(()) => {
                info!(actuator = %id, desired_on, "Actuator write accepted");
                Ok(())
            }
            Err(e) => {
                error!(actuator = %id, desired_on, error = %e, "Actuator write failed");
                Err(e)
            }
        }
    }

    /// Request the opposite of the last confirmed state. Returns the state
    /// requested.
    pub async fn toggle(&self, id: &str) -> Result<bool, WriteError> {
        let current = self.board.get(id).await.unwrap_or_default();
        let desired = !current.is_on;
        self.set_actuator(id, desired).await?;
        Ok(desired)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::store::{DocumentSnapshot, MemoryStore};

    fn setup() -> (MemoryStore, ActuatorBoard, ActuatorControl<MemoryStore>) {
        let store = MemoryStore::new();
        store.put(
            &actuator_path("Efan"),
            Fields::from([(STATUS_FIELD.to_owned(), FieldValue::Bool(false))]),
        );
        let board = ActuatorBoard::new();
        let control = ActuatorControl::new(store.clone(), board.clone(), &["Efan".to_owned()]);
        (store, board, control)
    }

    #[tokio::test]
    async fn turning_on_stamps_activation_time() {
        let (store, _, control) = setup();
        control.set_actuator("Efan", true).await.unwrap();

        let doc = store.get(&actuator_path("Efan")).unwrap();
        assert_eq!(doc[STATUS_FIELD], FieldValue::Bool(true));
        assert!(matches!(doc[TURNED_ON_FIELD], FieldValue::Timestamp(_)));
    }

    #[tokio::test]
    async fn turning_off_keeps_last_activation_time() {
        let (store, _, control) = setup();
        control.set_actuator("Efan", true).await.unwrap();
        let on_at = store.get(&actuator_path("Efan")).unwrap()[TURNED_ON_FIELD].clone();

        control.set_actuator("Efan", false).await.unwrap();

        let doc = store.get(&actuator_path("Efan")).unwrap();
        assert_eq!(doc[STATUS_FIELD], FieldValue::Bool(false));
        assert_eq!(doc[TURNED_ON_FIELD], on_at);
    }

    #[tokio::test]
    async fn turning_off_never_adds_an_activation_time() {
        let (store, _, control) = setup();
        control.set_actuator("Efan", false).await.unwrap();
        assert!(!store.get(&actuator_path("Efan")).unwrap().contains_key(TURNED_ON_FIELD));
    }

    #[tokio::test]
    async fn unknown_actuator_is_rejected_without_writing() {
        let (store, _, control) = setup();
        store.put(&actuator_path("Pump"), Fields::new());

        let err = control.set_actuator("Pump", true).await.unwrap_err();
        assert_eq!(err, WriteError::UnknownChannel("Pump".into()));
        assert!(store.get(&actuator_path("Pump")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_leaves_local_state_unchanged() {
        let (store, board, control) = setup();
        store.fail_writes(Some(WriteError::PermissionDenied(actuator_path("Efan"))));

        let err = control.set_actuator("Efan", true).await.unwrap_err();
        assert!(matches!(err, WriteError::PermissionDenied(_)));
        assert!(board.get("Efan").await.is_none());
        assert_eq!(store.get(&actuator_path("Efan")).unwrap()[STATUS_FIELD], FieldValue::Bool(false));
    }

    #[tokio::test]
    async fn successful_write_does_not_touch_local_state() {
        let (_, board, control) = setup();
        control.set_actuator("Efan", true).await.unwrap();
        assert!(board.get("Efan").await.is_none());
    }

    #[tokio::test]
    async fn toggle_negates_confirmed_state() {
        let (store, board, control) = setup();
        let on_at = Utc::now() - Duration::hours(1);
        board
            .reconcile(
                "Efan",
                &DocumentSnapshot {
                    path: actuator_path("Efan"),
                    exists: true,
                    fields: Fields::from([
                        (STATUS_FIELD.to_owned(), FieldValue::Bool(true)),
                        (TURNED_ON_FIELD.to_owned(), FieldValue::Timestamp(on_at)),
                    ]),
                    update_time: None,
                },
            )
            .await;

        assert!(!control.toggle("Efan").await.unwrap());
        assert_eq!(store.get(&actuator_path("Efan")).unwrap()[STATUS_FIELD], FieldValue::Bool(false));
    }

    #[tokio::test]
    async fn toggle_from_unknown_state_turns_on() {
        let (store, _, control) = setup();
        assert!(control.toggle("Efan").await.unwrap());
        assert_eq!(store.get(&actuator_path("Efan")).unwrap()[STATUS_FIELD], FieldValue::Bool(true));
    }
}
