//! Simulated environment on tokio's pausable clock.
//!
//! Under a paused runtime (`#[tokio::test(start_paused = true)]` or
//! [`paused_runtime`]) time only moves when every task is idle or a test calls
//! `tokio::time::advance`, so TTLs, debounce windows and timeouts are exact
//! and cost no wall-clock time.

use std::time::{Duration, Instant};

use tapgate_core::Environment;

/// Environment reading tokio's clock.
#[derive(Debug, Clone, Default)]
pub struct SimEnv;

impl SimEnv {
    /// Create a simulated environment.
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Single-threaded runtime with the clock paused at start.
pub fn paused_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread().enable_time().start_paused(true).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn time_moves_only_when_advanced() {
        let env = SimEnv::new();
        let start = env.now();

        assert_eq!(env.now(), start);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(env.now() - start, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_auto_advances_idle_clock() {
        let env = SimEnv::new();
        let start = env.now();

        env.sleep(Duration::from_secs(60)).await;
        assert_eq!(env.now() - start, Duration::from_secs(60));
    }
}
