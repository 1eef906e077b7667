//! Realtime notification bus.
//!
//! Mutation events are fanned out to every subscriber whose
//! [`SubscriptionFilter`] matches. Delivery is best-effort and at-most-once:
//! there is no durable queue and no replay.
//!
//! # Implementations
//!
//! | Bus | Scope | Fan-out |
//! |-----|-------|---------|
//! | [`LocalBus`] | one process | direct |
//! | [`BridgedBus`] | many processes | local + through a [`BusTransport`] |
//!
//! Both are used through the [`NotificationBus`] trait, so a deployment can
//! switch between them without touching publishers or subscribers.
//!
//! # Backpressure
//!
//! Each subscriber owns a bounded queue (`bus.buffer` in config). When it is
//! full the event is dropped for that subscriber only and a warning is
//! logged. Subscribers whose receiving end is gone are removed at the next
//! publish, or immediately when their [`Subscription`] is dropped.
//!
//! # Example
//!
//! ```
//! use quorum_event::{MutationEvent, MutationKind, SubscriptionFilter, Topic};
//! use quorum_runtime::bus::{LocalBus, NotificationBus};
//! use uuid::Uuid;
//!
//! # tokio_test_block(async {
//! let bus = LocalBus::new(16);
//! let mut sub = bus.subscribe(SubscriptionFilter::new().topic(Topic::Survey)).unwrap();
//!
//! let event = MutationEvent::new(Topic::Survey, MutationKind::Created, Uuid::new_v4(), None);
//! assert_eq!(bus.publish(event.clone()).await.unwrap(), 1);
//! assert_eq!(sub.recv().await, Some(event));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod bridged;
mod local;

pub use bridged::{BridgedBus, BusTransport, Envelope, LoopbackTransport};
pub use local::LocalBus;

use async_trait::async_trait;
use parking_lot::RwLock;
use quorum_event::{BusError, MutationEvent, SubscriptionFilter};
use quorum_types::SubscriberId;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Publish/subscribe contract shared by every bus implementation.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Publishes an event. Returns the number of local subscribers it was
    /// queued for.
    ///
    /// # Errors
    ///
    /// [`BusError::Closed`] after shutdown, [`BusError::Transport`] if a
    /// distributed transport rejected the event.
    async fn publish(&self, event: MutationEvent) -> Result<usize, BusError>;

    /// Opens a subscription.
    ///
    /// # Errors
    ///
    /// [`BusError::Closed`] after shutdown.
    fn subscribe(&self, filter: SubscriptionFilter) -> Result<Subscription, BusError>;

    /// Number of live local subscribers.
    fn subscriber_count(&self) -> usize;
}

struct Subscriber {
    filter: SubscriptionFilter,
    tx: mpsc::Sender<MutationEvent>,
}

/// Subscriber table shared by the bus implementations.
pub(crate) struct Registry {
    buffer: usize,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl Registry {
    pub(crate) fn new(buffer: usize) -> Arc<Self> {
        Arc::new(Self {
            buffer: buffer.max(1),
            subscribers: RwLock::new(HashMap::new()),
        })
    }

    pub(crate) fn subscribe(self: &Arc<Self>, filter: SubscriptionFilter) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = SubscriberId::new();
        self.subscribers.write().insert(
            id,
            Subscriber {
                filter: filter.clone(),
                tx,
            },
        );
        tracing::debug!(subscriber = %id, "subscriber registered");
        Subscription {
            id,
            filter,
            rx,
            registry: Arc::downgrade(self),
        }
    }

    /// Queues `event` for every matching subscriber and prunes closed ones.
    pub(crate) fn fan_out(&self, event: &MutationEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, sub) in subscribers.iter() {
                if !sub.filter.matches(event) {
                    continue;
                }
                match sub.tx.try_send(event.clone()) {
                    Ok(()) => delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::warn!(subscriber = %id, event = %event.id, "subscriber buffer full, event dropped");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }
        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &closed {
                subscribers.remove(id);
            }
            tracing::debug!(removed = closed.len(), "closed subscribers pruned");
        }
        delivered
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::debug!(subscriber = %id, "subscriber removed");
        }
    }

    pub(crate) fn clear(&self) {
        self.subscribers.write().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: SubscriberId,
    filter: SubscriptionFilter,
    rx: mpsc::Receiver<MutationEvent>,
    registry: Weak<Registry>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    #[must_use]
    pub fn filter(&self) -> &SubscriptionFilter {
        &self.filter
    }

    /// Waits for the next event. Returns `None` once the bus has closed.
    pub async fn recv(&mut self) -> Option<MutationEvent> {
        self.rx.recv().await
    }

    /// Returns a queued event without waiting.
    pub fn try_recv(&mut self) -> Option<MutationEvent> {
        self.rx.try_recv().ok()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}
