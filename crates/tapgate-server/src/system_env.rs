//! Production Environment implementation using system time.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait backed by the monotonic clock.

use std::time::Duration;

use tapgate_core::Environment;

/// Production environment using system time.
///
/// This implementation:
/// - Uses `std::time::Instant::now()` for time
/// - Uses `tokio::time::sleep()` for async sleeping
#[derive(Debug, Clone, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> std::time::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
