//! Fault-injecting bus wrapper.
//!
//! Wraps any [`Bus`] and turns publishes into transport failures, either on a
//! script (`fail_next`) or at a seeded random rate. A failed publish leaves
//! the wrapper disconnected: every publish fails until [`Bus::reconnect`] is
//! called, like a broker connection that dropped.

use std::sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tapgate_core::{Bus, BusError, QoS, Subscription};

struct Chaos {
    rng: ChaCha8Rng,
    failure_rate: f64,
    scripted: u32,
    connected: bool,
}

/// Bus wrapper with deterministic fault injection.
pub struct ChaoticBus<B: Bus> {
    inner: B,
    chaos: Mutex<Chaos>,
    publishes: AtomicU64,
    injected: AtomicU64,
    reconnects: AtomicU64,
}

impl<B: Bus> ChaoticBus<B> {
    /// Wrap `inner` with no random failures.
    pub fn new(inner: B, seed: u64) -> Self {
        Self::with_failure_rate(inner, seed, 0.0)
    }

    /// Wrap `inner`, failing each publish with probability `rate`.
    pub fn with_failure_rate(inner: B, seed: u64, rate: f64) -> Self {
        Self {
            inner,
            chaos: Mutex::new(Chaos {
                rng: ChaCha8Rng::seed_from_u64(seed),
                failure_rate: rate.clamp(0.0, 1.0),
                scripted: 0,
                connected: true,
            }),
            publishes: AtomicU64::new(0),
            injected: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    /// Fail the next `n` publishes regardless of the random rate.
    pub fn fail_next(&self, n: u32) {
        self.lock().scripted += n;
    }

    /// Drop the connection now.
    pub fn disconnect(&self) {
        self.lock().connected = false;
    }

    /// Whether the simulated connection is up.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Publish calls seen, failed or not.
    pub fn publish_attempts(&self) -> u64 {
        self.publishes.load(Ordering::Relaxed)
    }

    /// Publishes that failed.
    pub fn injected_failures(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    /// Reconnects performed.
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Chaos> {
        self.chaos.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide the fate of one publish. `true` means it fails.
    fn roll(&self) -> bool {
        let mut chaos = self.lock();

        if !chaos.connected {
            return true;
        }

        let fail = if chaos.scripted > 0 {
            chaos.scripted -= 1;
            true
        } else {
            let rate = chaos.failure_rate;
            rate > 0.0 && chaos.rng.gen_bool(rate)
        };

        if fail {
            chaos.connected = false;
        }
        fail
    }
}

#[async_trait]
impl<B: Bus> Bus for ChaoticBus<B> {
    async fn publish(&self, topic: &str, payload: Bytes, qos: QoS) -> Result<(), BusError> {
        self.publishes.fetch_add(1, Ordering::Relaxed);

        if self.roll() {
            self.injected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(topic, "injected publish failure");
            return Err(BusError::Disconnected("injected fault".to_string()));
        }

        self.inner.publish(topic, payload, qos).await
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        self.inner.subscribe(topic).await
    }

    async fn reconnect(&self) -> Result<(), BusError> {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        self.lock().connected = true;
        self.inner.reconnect().await
    }
}

impl<B: Bus> std::fmt::Debug for ChaoticBus<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaoticBus")
            .field("publishes", &self.publish_attempts())
            .field("injected", &self.injected_failures())
            .field("reconnects", &self.reconnects())
            .finish_non_exhaustive()
    }
}
