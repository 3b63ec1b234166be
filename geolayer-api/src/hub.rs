//! Update hub for live layer subscribers.
//!
//! Tracks WebSocket subscribers per datasource and fans change notifications
//! out to them. The subscriber count doubles as the shutdown gate: `main`
//! waits for it to reach zero before taking the final backup.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use geolayer_core::DatasourceId;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::constants::WS_SUBSCRIBER_BUFFER;
use crate::events::HubEvent;

type SubscriberMap = HashMap<DatasourceId, HashMap<u64, mpsc::Sender<HubEvent>>>;

/// Registry of live subscribers keyed by datasource.
pub struct UpdateHub {
    subscribers: RwLock<SubscriberMap>,
    next_id: AtomicU64,
    count_tx: watch::Sender<usize>,
}

impl Default for UpdateHub {
    fn default() -> Self {
        Self::new()
    }
}

impl UpdateHub {
    pub fn new() -> Self {
        let (count_tx, _count_rx) = watch::channel(0);
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            count_tx,
        }
    }

    fn publish_count(&self, subscribers: &SubscriberMap) {
        let total = subscribers.values().map(HashMap::len).sum();
        self.count_tx.send_replace(total);
    }

    /// Register a subscriber for `datasource`.
    ///
    /// The returned [`Subscription`] unsubscribes when dropped.
    pub fn subscribe(self: &Arc<Self>, datasource: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(WS_SUBSCRIBER_BUFFER);

        match self.subscribers.write() {
            Ok(mut subscribers) => {
                subscribers
                    .entry(datasource.to_string())
                    .or_default()
                    .insert(id, tx);
                self.publish_count(&subscribers);
            }
            Err(_) => warn!(datasource = %datasource, "Subscriber table poisoned"),
        }
        debug!(datasource = %datasource, subscriber = id, "Subscriber registered");

        Subscription {
            hub: Arc::clone(self),
            datasource: datasource.to_string(),
            id,
            rx,
        }
    }

    /// Remove one subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, datasource: &str, id: u64) {
        let Ok(mut subscribers) = self.subscribers.write() else {
            warn!(datasource = %datasource, "Subscriber table poisoned");
            return;
        };
        let removed = match subscribers.get_mut(datasource) {
            Some(group) => {
                let removed = group.remove(&id).is_some();
                if group.is_empty() {
                    subscribers.remove(datasource);
                }
                removed
            }
            None => false,
        };
        if removed {
            self.publish_count(&subscribers);
            debug!(datasource = %datasource, subscriber = id, "Subscriber removed");
        }
    }

    /// Send `event` to every subscriber of `datasource`. Returns how many
    /// subscribers accepted it.
    ///
    /// Subscribers whose connection has gone away are unsubscribed. A
    /// subscriber with a full queue misses this notification only.
    pub fn broadcast(&self, datasource: &str, event: HubEvent) -> usize {
        let targets: Vec<(u64, mpsc::Sender<HubEvent>)> = match self.subscribers.read() {
            Ok(subscribers) => subscribers
                .get(datasource)
                .map(|group| group.iter().map(|(id, tx)| (*id, tx.clone())).collect())
                .unwrap_or_default(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(datasource = %datasource, subscriber = id, "Subscriber queue full, notification dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    self.unsubscribe(datasource, id);
                }
            }
        }

        debug!(
            datasource = %datasource,
            event_type = event.event_type(),
            delivered,
            "Broadcast event"
        );
        delivered
    }

    /// Convenience wrapper for the common "layer changed" notification.
    pub fn notify_updated(&self, datasource: &str) -> usize {
        self.broadcast(
            datasource,
            HubEvent::LayerUpdated {
                datasource: datasource.to_string(),
            },
        )
    }

    pub fn subscriber_count(&self) -> usize {
        *self.count_tx.borrow()
    }

    /// Subscribers of one datasource.
    pub fn subscribers_of(&self, datasource: &str) -> usize {
        self.subscribers
            .read()
            .map(|s| s.get(datasource).map(HashMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Resolve once no subscriber remains.
    pub async fn wait_for_drain(&self) {
        let mut count_rx = self.count_tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = count_rx.wait_for(|count| *count == 0).await;
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription {
    hub: Arc<UpdateHub>,
    datasource: DatasourceId,
    id: u64,
    rx: mpsc::Receiver<HubEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn datasource(&self) -> &str {
        &self.datasource
    }

    /// Next event, or `None` once the hub has dropped this subscriber.
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(&self.datasource, self.id);
    }
}
