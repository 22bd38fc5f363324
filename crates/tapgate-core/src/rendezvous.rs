//! Rendezvous waiter.
//!
//! Blocks a request until a matching scan shows up in the mailbox or its time
//! budget runs out. The waiter wakes on every insert and also re-checks every
//! `poll_interval`, so latency to observe a matching scan is bounded by the
//! poll interval even if a wakeup is missed.
//!
//! # Invariants
//!
//! - A returned card was removed from the mailbox by this call only.
//! - With no match, the call returns `None` no earlier than `timeout` and no
//!   later than `timeout + poll_interval`.

use std::{pin::pin, sync::Arc, time::Duration};

use crate::{card::CardId, env::Environment, mailbox::ScanMailbox};

/// Waiter tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendezvousConfig {
    /// Upper bound between two mailbox checks.
    pub poll_interval: Duration,
}

impl Default for RendezvousConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(100) }
    }
}

/// Matches synchronous requests against asynchronously arriving scans.
pub struct RendezvousWaiter<E: Environment> {
    env: E,
    mailbox: Arc<ScanMailbox<E>>,
    config: RendezvousConfig,
}

impl<E: Environment> RendezvousWaiter<E> {
    /// Create a waiter over `mailbox`.
    pub fn new(env: E, mailbox: Arc<ScanMailbox<E>>, config: RendezvousConfig) -> Self {
        Self { env, mailbox, config }
    }

    /// The mailbox this waiter consumes from.
    pub fn mailbox(&self) -> &Arc<ScanMailbox<E>> {
        &self.mailbox
    }

    /// Wait up to `timeout` for a scan whose card satisfies `predicate`.
    ///
    /// Returns the consumed card, or `None` if nothing matched in time. There
    /// is no cancellation other than dropping the future.
    pub async fn await_card<P>(&self, timeout: Duration, predicate: P) -> Option<CardId>
    where
        P: Fn(CardId) -> bool + Send + Sync,
    {
        let started = self.env.now();

        loop {
            let mut inserted = pin!(self.mailbox.inserted());
            inserted.as_mut().enable();

            if let Some(event) = self.mailbox.take_matching(&predicate) {
                tracing::debug!(
                    card = %event.card(),
                    waited_ms = self.env.now().saturating_duration_since(started).as_millis(),
                    "rendezvous matched"
                );
                return Some(event.card());
            }

            let elapsed = self.env.now().saturating_duration_since(started);
            if elapsed >= timeout {
                tracing::debug!(timeout_ms = timeout.as_millis(), "rendezvous timed out");
                return None;
            }

            let nap = self.config.poll_interval.min(timeout - elapsed);
            tokio::select! {
                () = self.env.sleep(nap) => {},
                () = inserted => {},
            }
        }
    }
}

impl<E: Environment> Clone for RendezvousWaiter<E> {
    fn clone(&self) -> Self {
        Self { env: self.env.clone(), mailbox: Arc::clone(&self.mailbox), config: self.config }
    }
}

impl<E: Environment> std::fmt::Debug for RendezvousWaiter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendezvousWaiter")
            .field("mailbox", &self.mailbox)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
