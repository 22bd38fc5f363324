//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples rendezvous logic from the system clock.
//! This enables:
//!
//! - Deterministic Simulation: tests drive a paused virtual clock, so TTL
//!   expiry, debounce windows and rendezvous timeouts are exact and instant.
//!
//! - Production Runtime: `SystemEnv` uses the real monotonic clock without any
//!   code changes to the mailbox, waiter or debouncer.
//!
//! # Invariants
//!
//! - Monotonicity: `env.now()` must never go backwards
//! - Isolation: Implementations must not share global state

use std::time::{Duration, Instant};

/// Abstract environment providing time and async sleeping.
///
/// Every component that ages entries, measures windows or waits takes an
/// `Environment` instead of calling `Instant::now()` directly.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Returns the current time.
    ///
    /// # Invariants
    ///
    /// - Monotonicity: This method MUST return values that never decrease
    ///   within a single execution context. Subsequent calls must return times
    ///   >= previous calls.
    fn now(&self) -> Instant;

    /// Sleeps for the specified duration.
    ///
    /// This is the ONLY async method in the trait, and it should only be used
    /// by driver code (poll loops and waiters), never inside a lock.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;
}
