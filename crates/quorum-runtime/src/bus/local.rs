//! Single-process bus.

use super::{NotificationBus, Registry, Subscription};
use crate::config::BusConfig;
use async_trait::async_trait;
use quorum_event::{BusError, MutationEvent, SubscriptionFilter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-process fan-out bus.
pub struct LocalBus {
    registry: Arc<Registry>,
    closed: AtomicBool,
}

impl LocalBus {
    /// Creates a bus whose subscribers each buffer up to `buffer` events.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Registry::new(buffer),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn from_config(config: &BusConfig) -> Self {
        Self::new(config.buffer)
    }

    /// Shuts the bus down. Open subscriptions drain their queues and then
    /// end; later publishes and subscribes fail with [`BusError::Closed`].
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.registry.clear();
            tracing::info!("notification bus closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationBus for LocalBus {
    async fn publish(&self, event: MutationEvent) -> Result<usize, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let delivered = self.registry.fan_out(&event);
        tracing::trace!(topic = %event.topic, delivered, "event published");
        Ok(delivered)
    }

    fn subscribe(&self, filter: SubscriptionFilter) -> Result<Subscription, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(self.registry.subscribe(filter))
    }

    fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_event::{MutationKind, Topic};
    use quorum_types::TenantId;
    use uuid::Uuid;

    fn event(topic: Topic, tenant: Option<TenantId>) -> MutationEvent {
        MutationEvent::new(topic, MutationKind::Updated, Uuid::new_v4(), tenant)
    }

    #[tokio::test]
    async fn fan_out_respects_filters() {
        let bus = LocalBus::new(8);
        let tenant = TenantId::new();
        let mut surveys = bus.subscribe(SubscriptionFilter::new().topic(Topic::Survey)).unwrap();
        let mut scoped = bus.subscribe(SubscriptionFilter::new().tenant(tenant)).unwrap();
        let mut everything = bus.subscribe(SubscriptionFilter::new()).unwrap();

        let own = event(Topic::Survey, Some(tenant));
        let foreign = event(Topic::Session, Some(TenantId::new()));
        assert_eq!(bus.publish(own.clone()).await.unwrap(), 3);
        assert_eq!(bus.publish(foreign.clone()).await.unwrap(), 1);

        assert_eq!(surveys.try_recv(), Some(own.clone()));
        assert_eq!(surveys.try_recv(), None);
        assert_eq!(scoped.try_recv(), Some(own.clone()));
        assert_eq!(scoped.try_recv(), None);
        assert_eq!(everything.try_recv(), Some(own));
        assert_eq!(everything.try_recv(), Some(foreign));
    }

    #[tokio::test]
    async fn full_buffer_drops_for_that_subscriber_only() {
        let bus = LocalBus::new(1);
        let mut slow = bus.subscribe(SubscriptionFilter::new()).unwrap();
        let mut fast = bus.subscribe(SubscriptionFilter::new()).unwrap();

        let first = event(Topic::Survey, None);
        assert_eq!(bus.publish(first.clone()).await.unwrap(), 2);
        assert_eq!(fast.try_recv(), Some(first.clone()));

        let second = event(Topic::Survey, None);
        assert_eq!(bus.publish(second.clone()).await.unwrap(), 1);
        assert_eq!(fast.try_recv(), Some(second));
        assert_eq!(slow.try_recv(), Some(first));
        assert_eq!(slow.try_recv(), None);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn dropped_subscription_is_released() {
        let bus = LocalBus::new(4);
        let sub = bus.subscribe(SubscriptionFilter::new()).unwrap();
        let _other = bus.subscribe(SubscriptionFilter::new()).unwrap();
        assert_eq!(bus.subscriber_count(), 2);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(event(Topic::Tenant, None)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn close_ends_subscriptions() {
        let bus = LocalBus::new(4);
        let mut sub = bus.subscribe(SubscriptionFilter::new()).unwrap();
        let queued = event(Topic::Survey, None);
        bus.publish(queued.clone()).await.unwrap();

        bus.close();
        assert_eq!(sub.recv().await, Some(queued));
        assert_eq!(sub.recv().await, None);
        assert_eq!(bus.publish(event(Topic::Survey, None)).await, Err(BusError::Closed));
        assert!(matches!(bus.subscribe(SubscriptionFilter::new()), Err(BusError::Closed)));
    }
}
