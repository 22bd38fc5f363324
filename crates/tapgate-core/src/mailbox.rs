//! Scan mailbox.
//!
//! Holds recently observed scans until a request consumes them or they age
//! out. The server's bus receiver inserts; request handlers take.
//!
//! # Invariants
//!
//! - TTL: an entry older than the configured TTL is never returned. Expired
//!   entries are purged on every access.
//! - Exactly-once: purge, match and remove happen under one lock, so two
//!   concurrent takers never receive the same entry.
//! - Order: matching scans entries in insertion order (first fit).
//! - Bounded: at most `capacity` entries are held; the oldest is evicted when
//!   a full mailbox receives another scan.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tokio::sync::{Notify, futures::Notified};

use crate::{
    card::{CardId, ScanEvent},
    env::Environment,
};

/// Mailbox limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxConfig {
    /// Maximum age of an unconsumed scan.
    pub ttl: Duration,
    /// Maximum number of held scans.
    pub capacity: usize,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self { ttl: Duration::from_secs(5), capacity: 64 }
    }
}

/// Time-ordered, size-bounded set of unconsumed scans.
pub struct ScanMailbox<E: Environment> {
    env: E,
    config: MailboxConfig,
    entries: Mutex<VecDeque<ScanEvent>>,
    inserted: Notify,
}

impl<E: Environment> ScanMailbox<E> {
    /// Create an empty mailbox.
    pub fn new(env: E, config: MailboxConfig) -> Self {
        let config = MailboxConfig { capacity: config.capacity.max(1), ..config };
        Self {
            env,
            entries: Mutex::new(VecDeque::with_capacity(config.capacity)),
            config,
            inserted: Notify::new(),
        }
    }

    /// Limits this mailbox was built with.
    pub fn config(&self) -> MailboxConfig {
        self.config
    }

    /// Record a scan of `card`, timestamped now.
    pub fn insert(&self, card: CardId) {
        let now = self.env.now();
        {
            let mut entries = self.lock();
            self.purge(&mut entries, now);

            if entries.len() >= self.config.capacity {
                if let Some(evicted) = entries.pop_front() {
                    tracing::warn!(
                        card = %evicted.card(),
                        capacity = self.config.capacity,
                        "mailbox full, evicting oldest scan"
                    );
                }
            }

            entries.push_back(ScanEvent::new(card, now));
            tracing::debug!(card = %card, pending = entries.len(), "scan queued");
        }

        self.inserted.notify_waiters();
    }

    /// Remove and return the first unexpired scan whose card satisfies
    /// `predicate`.
    pub fn take_matching<P>(&self, predicate: P) -> Option<ScanEvent>
    where
        P: Fn(CardId) -> bool,
    {
        let now = self.env.now();
        let mut entries = self.lock();
        self.purge(&mut entries, now);

        let index = entries.iter().position(|event| predicate(event.card()))?;
        entries.remove(index)
    }

    /// Number of unexpired scans.
    pub fn len(&self) -> usize {
        let now = self.env.now();
        let mut entries = self.lock();
        self.purge(&mut entries, now);
        entries.len()
    }

    /// True if no unexpired scans are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Future resolving on the next insert.
    ///
    /// Waiters must `enable` it before checking the mailbox so an insert that
    /// lands between the check and the wait is not missed.
    pub(crate) fn inserted(&self) -> Notified<'_> {
        self.inserted.notified()
    }

    fn purge(&self, entries: &mut VecDeque<ScanEvent>, now: Instant) {
        let before = entries.len();
        entries.retain(|event| now.saturating_duration_since(event.observed_at()) <= self.config.ttl);

        let expired = before - entries.len();
        if expired > 0 {
            tracing::debug!(expired, "purged stale scans");
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ScanEvent>> {
        // Entries stay consistent even if a holder panicked mid-scan
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E: Environment> std::fmt::Debug for ScanMailbox<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanMailbox")
            .field("config", &self.config)
            .field("pending", &self.lock().len())
            .finish_non_exhaustive()
    }
}
