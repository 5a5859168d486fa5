//! Live feeds from the document store into local state.
//!
//! One task per subscription drains the channel's snapshot stream and hands
//! each snapshot to its owner: sensor snapshots to the [`SensorService`],
//! actuator snapshots to the [`ActuatorBoard`]. Snapshots on one channel are
//! applied in the order the store emits them.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
    },
};

use tokio::task::AbortHandle;
use tracing::{debug, error, info};

use crate::{
    actuators::ActuatorBoard,
    channels::{Channel, Channels},
    errors::FeedError,
    sensors::SensorService,
    store::{actuator_path, sensor_path, DocumentStore},
};

/// Called with the channel id when a feed fails. The feed is closed
/// afterwards; re-subscribing is up to the caller.
pub type FaultHandler = Arc<dyn Fn(&str, &FeedError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Identifies one open feed. Releasing it twice is harmless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    channel: String,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

fn log_fault() -> FaultHandler {
    Arc::new(|channel: &str, e: &FeedError| {
        error!(channel = %channel, error = %e, "Live feed failed");
    })
}

#[derive(Clone)]
pub struct SubscriptionManager<S> {
    inner: Arc<Inner<S>>,
}

struct Inner<S> {
    store: S,
    channels: Channels,
    sensors: SensorService<S>,
    actuators: ActuatorBoard,
    fault_handler: Arc<RwLock<FaultHandler>>,
    tasks: Mutex<HashMap<SubscriptionId, AbortHandle>>,
    next_id: AtomicU64,
}

impl<S: DocumentStore> SubscriptionManager<S> {
    pub fn new(
        store: S,
        channels: Channels,
        sensors: SensorService<S>,
        actuators: ActuatorBoard,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                channels,
                sensors,
                actuators,
                fault_handler: Arc::new(RwLock::new(log_fault())),
                tasks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Replace the handler notified when a feed fails (default: log at error).
    pub fn set_fault_handler(&self, handler: FaultHandler) {
        *self
            .inner
            .fault_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = handler;
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<SubscriptionId, AbortHandle>> {
        self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a live feed for `channel_id` (a sensor or an actuator id).
    pub fn subscribe(&self, channel_id: &str) -> Result<SubscriptionHandle, FeedError> {
        let channel = self
            .inner
            .channels
            .resolve(channel_id)
            .ok_or_else(|| FeedError::UnknownChannel(channel_id.to_owned()))?;

        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let task = tokio::spawn(run_feed(
            channel,
            self.inner.store.clone(),
            self.inner.sensors.clone(),
            self.inner.actuators.clone(),
            self.inner.fault_handler.clone(),
        ));
        let mut tasks = self.tasks();
        // Feeds that ended on a fault are not released by anyone else.
        tasks.retain(|_, task| !task.is_finished());
        tasks.insert(id, task.abort_handle());
        drop(tasks);

        info!(channel = %channel_id, subscription = id.0, "Subscribed");
        Ok(SubscriptionHandle {
            id,
            channel: channel_id.to_owned(),
        })
    }

    /// Close the feed behind `handle`. Returns `false` if it was already
    /// closed, by an earlier call or by a fault; never fails.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        match self.tasks().remove(&handle.id) {
            Some(task) => {
                task.abort();
                info!(channel = %handle.channel, subscription = handle.id.0, "Unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Whether the feed behind `handle` is still delivering snapshots.
    pub fn is_active(&self, handle: &SubscriptionHandle) -> bool {
        self.tasks()
            .get(&handle.id)
            .is_some_and(|task| !task.is_finished())
    }

    pub fn active_count(&self) -> usize {
        self.tasks().values().filter(|t| !t.is_finished()).count()
    }

    /// Start a scope whose feeds are all closed when it is dropped.
    pub fn scope(&self) -> SubscriptionScope<S> {
        SubscriptionScope {
            manager: self.clone(),
            handles: Vec::new(),
        }
    }
}

async fn run_feed<S: DocumentStore>(
    channel: Channel,
    store: S,
    sensors: SensorService<S>,
    actuators: ActuatorBoard,
    fault_handler: Arc<RwLock<FaultHandler>>,
) {
    let path = match &channel {
        Channel::Sensor(s) => sensor_path(&s.id),
        Channel::Actuator(id) => actuator_path(id),
    };
    let mut feed = store.observe(&path);

    while let Some(event) = feed.next().await {
        match event {
            Ok(snapshot) => match &channel {
                Channel::Sensor(sensor) => {
                    sensors.apply_snapshot(sensor, &snapshot).await;
                }
                Channel::Actuator(id) => {
                    actuators.reconcile(id, &snapshot).await;
                }
            },
            Err(e) => {
                let handler = fault_handler
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                handler(channel.id(), &e);
                return;
            }
        }
    }

    debug!(channel = %channel.id(), "Feed ended");
}

/// Feeds held on behalf of one consumer. Dropping the scope releases every
/// feed it opened, on every exit path.
pub struct SubscriptionScope<S: DocumentStore> {
    manager: SubscriptionManager<S>,
    handles: Vec<SubscriptionHandle>,
}

impl<S: DocumentStore> SubscriptionScope<S> {
    pub fn subscribe(&mut self, channel_id: &str) -> Result<SubscriptionHandle, FeedError> {
        let handle = self.manager.subscribe(channel_id)?;
        self.handles.push(handle.clone());
        Ok(handle)
    }

    /// Subscribe to every configured channel.
    pub fn subscribe_all(&mut self) -> Result<(), FeedError> {
        let ids: Vec<String> = self
            .manager
            .inner
            .channels
            .all()
            .map(|c| c.id().to_owned())
            .collect();
        for id in ids {
            self.subscribe(&id)?;
        }
        Ok(())
    }

    pub fn handles(&self) -> &[SubscriptionHandle] {
        &self.handles
    }
}

impl<S: DocumentStore> Drop for SubscriptionScope<S> {
    fn drop(&mut self) {
        for handle in self.handles.drain(..) {
            self.manager.unsubscribe(&handle);
        }
    }
}
