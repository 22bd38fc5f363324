//! Scan publishing.
//!
//! Accepted reads are handed from the poll loop to a worker task through a
//! bounded queue, so the poll loop never waits on network I/O. The worker
//! publishes each scan under a [`PublishPolicy`]: a transient transport
//! failure triggers a reconnect and a retry; once retries are exhausted the
//! scan is dropped, never requeued. Scans are at-most-once from the reader's
//! point of view.

use std::sync::Arc;

use tapgate_core::{Bus, BusError, CardId, QoS, SCAN_TOPIC};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Retry policy for a failed publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishPolicy {
    /// Reconnect-and-retry cycles after the first failure.
    pub max_retries: u32,
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self { max_retries: 1 }
    }
}

/// What happened to one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Published on the first try.
    Delivered,
    /// Published after reconnecting.
    Recovered {
        /// Retries it took.
        retries: u32,
    },
    /// Given up on.
    Dropped {
        /// The last failure.
        error: BusError,
    },
}

/// Totals reported when a worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Scans published on the first try.
    pub delivered: u64,
    /// Scans published after reconnecting.
    pub recovered: u64,
    /// Scans dropped.
    pub dropped: u64,
}

impl PublishStats {
    fn record(&mut self, outcome: &PublishOutcome) {
        match outcome {
            PublishOutcome::Delivered => self.delivered += 1,
            PublishOutcome::Recovered { .. } => self.recovered += 1,
            PublishOutcome::Dropped { .. } => self.dropped += 1,
        }
    }
}

/// Why a scan could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity.
    Full,
    /// The worker has stopped.
    Closed,
}

/// Producer end of the publish queue, owned by the poll loop.
#[derive(Debug, Clone)]
pub struct ScanQueue {
    tx: mpsc::Sender<CardId>,
}

impl ScanQueue {
    /// Create a queue holding up to `capacity` scans, returning the producer
    /// and the receiver the worker drains.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<CardId>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `card` without waiting.
    pub fn enqueue(&self, card: CardId) -> Result<(), EnqueueError> {
        self.tx.try_send(card).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }
}

/// Publishes scans on [`SCAN_TOPIC`] with bounded retry.
pub struct ScanPublisher<B: Bus> {
    bus: Arc<B>,
    policy: PublishPolicy,
}

impl<B: Bus> ScanPublisher<B> {
    /// Create a publisher.
    pub fn new(bus: Arc<B>, policy: PublishPolicy) -> Self {
        Self { bus, policy }
    }

    /// Publish one scan.
    ///
    /// Transient failures reconnect and retry up to `max_retries` times.
    /// Permanent failures drop the scan immediately. Never returns an error:
    /// the outcome says whether the scan made it.
    pub async fn publish(&self, card: CardId) -> PublishOutcome {
        let mut retries = 0;

        loop {
            let error = match self.bus.publish(SCAN_TOPIC, card.to_payload(), QoS::AtMostOnce).await
            {
                Ok(()) if retries == 0 => return PublishOutcome::Delivered,
                Ok(()) => {
                    tracing::info!(card = %card, retries, "scan published after reconnect");
                    return PublishOutcome::Recovered { retries };
                },
                Err(e) => e,
            };

            if !error.is_transient() || retries >= self.policy.max_retries {
                tracing::warn!(card = %card, retries, error = %error, "dropping scan");
                return PublishOutcome::Dropped { error };
            }

            retries += 1;
            tracing::warn!(card = %card, error = %error, "publish failed, reconnecting");
            if let Err(e) = self.bus.reconnect().await {
                tracing::warn!(error = %e, "reconnect failed");
            }
        }
    }

    /// Drain `queue` until every producer is gone.
    pub async fn run(self, mut queue: mpsc::Receiver<CardId>) -> PublishStats {
        let mut stats = PublishStats::default();

        while let Some(card) = queue.recv().await {
            let outcome = self.publish(card).await;
            if outcome == PublishOutcome::Delivered {
                tracing::debug!(card = %card, "scan published");
            }
            stats.record(&outcome);
        }

        tracing::info!(?stats, "publish worker stopped");
        stats
    }
}

impl<B: Bus> std::fmt::Debug for ScanPublisher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPublisher").field("policy", &self.policy).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use tapgate_core::MemoryBus;

    use super::*;

    #[test]
    fn default_policy_retries_once() {
        assert_eq!(PublishPolicy::default().max_retries, 1);
    }

    #[test]
    fn enqueue_never_waits() {
        let (queue, mut rx) = ScanQueue::bounded(1);

        assert_eq!(queue.enqueue(CardId::new(1)), Ok(()));
        assert_eq!(queue.enqueue(CardId::new(2)), Err(EnqueueError::Full));

        rx.close();
        assert_eq!(queue.enqueue(CardId::new(3)), Err(EnqueueError::Closed));
    }

    #[tokio::test]
    async fn healthy_bus_delivers_first_try() {
        let bus = Arc::new(MemoryBus::new());
        let mut sub = bus.subscribe(SCAN_TOPIC).await.unwrap();
        let publisher = ScanPublisher::new(Arc::clone(&bus), PublishPolicy::default());

        assert_eq!(publisher.publish(CardId::new(42)).await, PublishOutcome::Delivered);
        assert_eq!(sub.recv().await.as_deref(), Some(&b"42"[..]));
    }

    #[tokio::test]
    async fn closed_bus_drops_without_retrying() {
        let bus = Arc::new(MemoryBus::new());
        bus.close();
        let publisher = ScanPublisher::new(bus, PublishPolicy { max_retries: 5 });

        assert_eq!(
            publisher.publish(CardId::new(1)).await,
            PublishOutcome::Dropped { error: BusError::Closed }
        );
    }

    #[tokio::test]
    async fn worker_drains_queue_and_reports_stats() {
        let bus = Arc::new(MemoryBus::new());
        let mut sub = bus.subscribe(SCAN_TOPIC).await.unwrap();
        let (queue, rx) = ScanQueue::bounded(8);
        let worker = tokio::spawn(ScanPublisher::new(Arc::clone(&bus), PublishPolicy::default()).run(rx));

        queue.enqueue(CardId::new(1)).unwrap();
        queue.enqueue(CardId::new(2)).unwrap();
        drop(queue);

        let stats = worker.await.unwrap();
        assert_eq!(stats, PublishStats { delivered: 2, recovered: 0, dropped: 0 });
        assert_eq!(sub.recv().await.as_deref(), Some(&b"1"[..]));
        assert_eq!(sub.recv().await.as_deref(), Some(&b"2"[..]));
    }
}
