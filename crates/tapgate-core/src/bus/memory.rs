//! In-process bus.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};

use super::{Bus, BusError, QoS, Subscription};

/// In-memory broker.
///
/// Delivery is immediate and lossless, so both QoS levels behave the same.
/// Subscribers whose [`Subscription`] was dropped are pruned on the next
/// publish to their topic.
#[derive(Debug, Default)]
pub struct MemoryBus {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    routes: HashMap<String, Vec<UnboundedSender<Bytes>>>,
    closed: bool,
}

impl MemoryBus {
    /// Create an open bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shut the bus down. Live subscriptions end and further operations fail
    /// with [`BusError::Closed`].
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.routes.clear();
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .routes
            .get(topic)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Bus for MemoryBus {
    async fn publish(&self, topic: &str, payload: Bytes, _qos: QoS) -> Result<(), BusError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(BusError::Closed);
        }

        if let Some(senders) = inner.routes.get_mut(topic) {
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(BusError::Closed);
        }

        let (tx, rx) = unbounded_channel();
        inner.routes.entry(topic.to_string()).or_default().push(tx);
        Ok(Subscription::new(topic, rx))
    }

    async fn reconnect(&self) -> Result<(), BusError> {
        if self.lock().closed { Err(BusError::Closed) } else { Ok(()) }
    }
}
