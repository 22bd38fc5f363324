//! Message bus seam.
//!
//! The rendezvous core treats the bus as a black box with three primitives:
//! publish, subscribe and a non-blocking receive. [`Bus`] is that seam; the
//! transport behind it (broker client, reconnect loop) is not a concern of
//! this crate. [`MemoryBus`] is an in-process implementation used by the
//! console binary and by tests.
//!
//! # Topics
//!
//! - [`SCAN_TOPIC`]: reader → server, payload is the card id in decimal.
//! - [`CONTROL_TOPIC`]: server → reader, payload is `start` or `stop`.

mod memory;

use async_trait::async_trait;
use bytes::Bytes;
pub use memory::MemoryBus;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};

/// Topic carrying scan events.
pub const SCAN_TOPIC: &str = "rfid/scan";

/// Topic carrying control directives.
pub const CONTROL_TOPIC: &str = "rfid/control";

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QoS {
    /// Fire and forget (QoS 0).
    #[default]
    AtMostOnce,
    /// Delivered at least once, possibly duplicated (QoS 1).
    AtLeastOnce,
}

/// Errors raised by bus primitives.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The connection to the broker is down.
    #[error("transport disconnected: {0}")]
    Disconnected(String),

    /// The bus has been shut down for good.
    #[error("bus closed")]
    Closed,

    /// The broker refused the operation.
    #[error("broker rejected {topic}: {reason}")]
    Rejected {
        /// Topic the operation targeted.
        topic: String,
        /// Broker-supplied reason.
        reason: String,
    },
}

impl BusError {
    /// Returns true if a reconnect may clear this error.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Disconnected(_) => true,
            Self::Closed | Self::Rejected { .. } => false,
        }
    }
}

/// Stream of payloads published on one topic.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: UnboundedReceiver<Bytes>,
}

impl Subscription {
    /// Wrap a receiver fed with `topic`'s payloads.
    pub fn new(topic: impl Into<String>, rx: UnboundedReceiver<Bytes>) -> Self {
        Self { topic: topic.into(), rx }
    }

    /// Topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next payload. `None` once the bus drops the subscription.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }

    /// Non-blocking poll for a pending payload.
    ///
    /// Returns `Ok(None)` when nothing is pending and `Err(BusError::Closed)`
    /// once the bus has dropped the subscription.
    pub fn receive_once(&mut self) -> Result<Option<Bytes>, BusError> {
        match self.rx.try_recv() {
            Ok(payload) => Ok(Some(payload)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BusError::Closed),
        }
    }
}

/// Publish/subscribe primitives the rendezvous core depends on.
///
/// Implementations restore existing subscriptions on [`Bus::reconnect`].
#[async_trait]
pub trait Bus: Send + Sync + 'static {
    /// Publish `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), BusError>;

    /// Subscribe to `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;

    /// Re-establish the broker connection and resubscribe.
    async fn reconnect(&self) -> Result<(), BusError>;
}
