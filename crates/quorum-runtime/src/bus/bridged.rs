//! Bus bridged across processes through an external transport.
//!
//! ```text
//!  process A                      transport                     process B
//! ┌──────────┐  send(Envelope)  ┌───────────┐  inbound()      ┌──────────┐
//! │BridgedBus│ ───────────────► │  broker   │ ──────────────► │BridgedBus│
//! │  local   │                  └───────────┘                 │  pump    │
//! │ fan-out  │                                                │ fan-out  │
//! └──────────┘                                                └──────────┘
//! ```
//!
//! Events are delivered to local subscribers directly at publish time. The
//! pump task skips envelopes that carry this bus's own origin, so local
//! subscribers never see an event twice.

use super::{NotificationBus, Registry, Subscription};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use quorum_event::{BusError, MutationEvent, SubscriptionFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// An event on the wire, tagged with the bus instance that published it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub origin: Uuid,
    pub event: MutationEvent,
}

/// Narrow interface to a message broker.
#[async_trait]
pub trait BusTransport: Send + Sync + 'static {
    /// Hands an envelope to the broker.
    ///
    /// # Errors
    ///
    /// [`BusError::Transport`] if the broker rejected or never received it.
    async fn send(&self, envelope: &Envelope) -> Result<(), BusError>;

    /// Stream of envelopes published by every node, including this one.
    fn inbound(&self) -> BoxStream<'static, Envelope>;
}

/// A [`NotificationBus`] spanning processes.
///
/// Must be created inside a Tokio runtime: construction spawns the pump
/// task, which is aborted when the bus is dropped.
pub struct BridgedBus<T: BusTransport> {
    origin: Uuid,
    transport: Arc<T>,
    registry: Arc<Registry>,
    pump: JoinHandle<()>,
}

impl<T: BusTransport> BridgedBus<T> {
    pub fn new(transport: Arc<T>, buffer: usize) -> Self {
        let origin = Uuid::new_v4();
        let registry = Registry::new(buffer);
        let mut inbound = transport.inbound();
        let fan_out = Arc::clone(&registry);
        let pump = tokio::spawn(async move {
            while let Some(envelope) = inbound.next().await {
                if envelope.origin == origin {
                    continue;
                }
                fan_out.fan_out(&envelope.event);
            }
            tracing::info!(%origin, "bus transport stream ended");
        });
        Self {
            origin,
            transport,
            registry,
            pump,
        }
    }

    #[must_use]
    pub fn origin(&self) -> Uuid {
        self.origin
    }
}

impl<T: BusTransport> Drop for BridgedBus<T> {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

#[async_trait]
impl<T: BusTransport> NotificationBus for BridgedBus<T> {
    async fn publish(&self, event: MutationEvent) -> Result<usize, BusError> {
        let delivered = self.registry.fan_out(&event);
        let envelope = Envelope {
            origin: self.origin,
            event,
        };
        self.transport.send(&envelope).await?;
        Ok(delivered)
    }

    fn subscribe(&self, filter: SubscriptionFilter) -> Result<Subscription, BusError> {
        if self.pump.is_finished() {
            return Err(BusError::Closed);
        }
        Ok(self.registry.subscribe(filter))
    }

    fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

/// In-memory transport connecting buses in one process. Clones share the
/// same channel.
#[derive(Clone)]
pub struct LoopbackTransport {
    tx: broadcast::Sender<Envelope>,
}

impl LoopbackTransport {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

#[async_trait]
impl BusTransport for LoopbackTransport {
    async fn send(&self, envelope: &Envelope) -> Result<(), BusError> {
        // No receivers just means no other node is listening.
        let _ = self.tx.send(envelope.clone());
        Ok(())
    }

    fn inbound(&self) -> BoxStream<'static, Envelope> {
        let rx = self.tx.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => return Some((envelope, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "loopback transport lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}
