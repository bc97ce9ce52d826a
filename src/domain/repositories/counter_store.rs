//! Counter store trait backing the fixed-window rate limiter.

use crate::error::AppError;
use async_trait::async_trait;
use std::time::Duration;

/// Expiring integer counters addressed by string key.
///
/// `increment` must be atomic per key: two concurrent callers always receive
/// distinct counts. A counter whose window has passed reads as zero even if
/// it has not been physically removed yet.
///
/// # Implementations
///
/// - [`crate::infrastructure::rate_limit::MemoryCounterStore`] - in-process concurrent map
/// - [`crate::infrastructure::rate_limit::RedisCounterStore`] - shared Redis counters
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Adds one to `key` and returns the new count. A newly created counter
    /// expires after `window`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Timeout`] if a remote store does not answer in time.
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, AppError>;

    /// Current count for `key`, or 0 if absent or expired.
    async fn get(&self, key: &str) -> Result<u64, AppError>;

    /// Drops `key`.
    async fn reset(&self, key: &str) -> Result<(), AppError>;

    /// Backend label for logs.
    fn backend(&self) -> &'static str;
}
