//! Server-side scan receiver.
//!
//! Drains [`SCAN_TOPIC`] into the mailbox. Malformed payloads are logged and
//! dropped; delivery may be at-most-once or at-least-once, the mailbox does
//! not assume either.

use std::sync::Arc;

use crate::{
    bus::{Bus, BusError, SCAN_TOPIC, Subscription},
    card::CardId,
    env::Environment,
    mailbox::ScanMailbox,
};

/// Feeds scan events from the bus into a [`ScanMailbox`].
#[derive(Debug)]
pub struct ScanSubscriber<E: Environment> {
    subscription: Subscription,
    mailbox: Arc<ScanMailbox<E>>,
}

impl<E: Environment> ScanSubscriber<E> {
    /// Subscribe to scan events on `bus`.
    ///
    /// Scans published after this returns are guaranteed to reach the
    /// mailbox once [`ScanSubscriber::run`] is polled.
    pub async fn attach<B: Bus>(bus: &B, mailbox: Arc<ScanMailbox<E>>) -> Result<Self, BusError> {
        let subscription = bus.subscribe(SCAN_TOPIC).await?;
        tracing::info!(topic = SCAN_TOPIC, "scan subscriber attached");
        Ok(Self { subscription, mailbox })
    }

    /// Receive scans until the bus drops the subscription.
    pub async fn run(mut self) {
        while let Some(payload) = self.subscription.recv().await {
            self.handle_payload(&payload);
        }

        tracing::info!(topic = SCAN_TOPIC, "scan subscription ended");
    }

    /// Insert one payload's card into the mailbox.
    ///
    /// Returns the card, or `None` if the payload was malformed.
    pub fn handle_payload(&self, payload: &[u8]) -> Option<CardId> {
        match CardId::from_payload(payload) {
            Ok(card) => {
                self.mailbox.insert(card);
                Some(card)
            },
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed scan payload");
                None
            },
        }
    }
}
