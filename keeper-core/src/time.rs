//! Clock seam for the session transport.
//!
//! Idle intervals, DNS budgets and connect budgets are all measured through
//! [`TimeProvider`], so tests can run them against tokio's paused clock or a
//! recording wrapper.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// A bounded operation ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The budget given to [`TimeProvider::timeout`] elapsed first.
    #[error("operation did not complete within {0:?}")]
    Elapsed(Duration),
}

/// Monotonic clock, sleeps and deadlines.
///
/// `now()` readings only compare against other readings of the same
/// provider (or a clone of it).
#[async_trait(?Send)]
pub trait TimeProvider: Clone {
    /// Suspend the current task for `duration`.
    async fn sleep(&self, duration: Duration) -> Result<(), TimeError>;

    /// Time elapsed since the provider was created.
    fn now(&self) -> Duration;

    /// Race `future` against `duration`.
    ///
    /// The loser is dropped without being polled again.
    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: Future<Output = T>;
}

/// Clock backed by `tokio::time`, so it honours a paused test runtime.
#[derive(Debug, Clone)]
pub struct TokioTimeProvider {
    origin: tokio::time::Instant,
}

impl TokioTimeProvider {
    /// Start a clock at zero.
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for TokioTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl TimeProvider for TokioTimeProvider {
    async fn sleep(&self, duration: Duration) -> Result<(), TimeError> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn timeout<F, T>(&self, duration: Duration, future: F) -> Result<T, TimeError>
    where
        F: Future<Output = T>,
    {
        tokio::time::timeout(duration, future)
            .await
            .map_err(|_| TimeError::Elapsed(duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_now_follows_tokio_clock() {
        let time = TokioTimeProvider::new();
        let before = time.now();
        time.sleep(Duration::from_secs(3)).await.expect("sleep");
        assert!(time.now() - before >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_elapses() {
        let time = TokioTimeProvider::new();
        let budget = Duration::from_millis(10);
        let result = time.timeout(budget, std::future::pending::<()>()).await;
        assert_eq!(result, Err(TimeError::Elapsed(budget)));
        assert_eq!(
            result.expect_err("elapsed").to_string(),
            "operation did not complete within 10ms"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_completes() {
        let time = TokioTimeProvider::new();
        let result = time.timeout(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
