//! Broadcast hub for location subscribers.
//!
//! The hub owns the set of open subscriber queues. Each connection task drains
//! its own bounded queue, so a slow socket never blocks ingest or the other
//! subscribers. Broadcasts iterate over a snapshot of the set; queues found
//! closed are removed after the iteration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, warn};

use gpsbridge_core::{Location, LocationStore, MemoryLocationStore};

/// Location store shared between the hub, the uploader and the HTTP handlers.
pub type SharedStore = Arc<RwLock<MemoryLocationStore>>;

/// Create an empty shared store.
pub fn shared_store() -> SharedStore {
    Arc::new(RwLock::new(MemoryLocationStore::new()))
}

/// Queue feeding one subscriber connection.
pub type SubscriberSink = mpsc::Sender<Location>;

/// Handle identifying a registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the location was queued for.
    pub delivered: usize,
    /// Subscribers whose queue was full; they stay registered.
    pub lagged: usize,
    /// Subscribers found closed and removed.
    pub removed: usize,
}

/// Registry of live subscribers.
pub struct BroadcastHub {
    store: SharedStore,
    subscribers: Mutex<HashMap<SubscriberId, SubscriberSink>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub replaying from `store`.
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The store this hub replays from.
    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    /// Register a subscriber.
    ///
    /// If a location is already known it is queued for this subscriber alone,
    /// before any later broadcast can reach it.
    pub async fn on_connect(&self, sink: SubscriberSink) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));

        // Lock order is subscribers, then store; `publish` uses the same.
        let mut subscribers = self.subscribers.lock().await;
        let current = self.store.read().await.get();

        if let Some(location) = current {
            match sink.try_send(location) {
                Ok(()) => debug!("Replayed {} to subscriber {}", location, id),
                Err(e) => warn!("Could not replay location to subscriber {}: {}", id, e),
            }
        }

        subscribers.insert(id, sink);
        debug!("Subscriber {} registered ({} active)", id, subscribers.len());
        id
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub async fn on_disconnect(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.remove(&id).is_some() {
            debug!("Subscriber {} removed ({} active)", id, subscribers.len());
        }
    }

    /// Store a new location and broadcast it.
    ///
    /// The store update and the subscriber snapshot happen under the registry
    /// lock, so a subscriber joining concurrently gets the location either as
    /// its replay or through this broadcast, never both.
    pub async fn publish(&self, location: Location) -> BroadcastReport {
        let snapshot = {
            let subscribers = self.subscribers.lock().await;
            self.store.write().await.set(location);
            Self::snapshot_of(&subscribers)
        };
        self.deliver(location, snapshot).await
    }

    /// Broadcast a location to every registered subscriber.
    pub async fn on_location_updated(&self, location: Location) -> BroadcastReport {
        let snapshot = {
            let subscribers = self.subscribers.lock().await;
            Self::snapshot_of(&subscribers)
        };
        self.deliver(location, snapshot).await
    }

    /// Number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    fn snapshot_of(
        subscribers: &HashMap<SubscriberId, SubscriberSink>,
    ) -> Vec<(SubscriberId, SubscriberSink)> {
        subscribers
            .iter()
            .map(|(id, sink)| (*id, sink.clone()))
            .collect()
    }

    async fn deliver(
        &self,
        location: Location,
        snapshot: Vec<(SubscriberId, SubscriberSink)>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();

        for (id, sink) in snapshot {
            match sink.try_send(location) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Subscriber {} is lagging, dropped {}", id, location);
                    report.lagged += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber {} closed", id);
                    closed.push(id);
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.lock().await;
            for id in closed {
                if subscribers.remove(&id).is_some() {
                    report.removed += 1;
                }
            }
        }

        report
    }
}
