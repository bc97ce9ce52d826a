//! Cache tier trait, cached payload and error types.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{Link, LinkStatus};

/// Errors that can occur during cache operations.
#[derive(Debug)]
pub enum CacheError {
    ConnectionError(String),
    OperationError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConnectionError(e) => write!(f, "Cache connection error: {}", e),
            Self::OperationError(e) => write!(f, "Cache operation error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A resolved short code as held by a cache tier.
///
/// Only resolvable links are ever cached; a lookup that ends in "not found"
/// leaves every tier untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub target: String,
    pub link_id: u64,
    pub status: LinkStatus,
    /// Unix milliseconds at which the entry was written.
    pub cached_at: u64,
    /// Expiry of the link itself. No tier may keep the entry past it.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn from_link(link: &Link, cached_at: u64) -> Self {
        Self {
            target: link.target.clone(),
            link_id: link.id,
            status: link.status,
            cached_at,
            expires_at: link.expires_at,
        }
    }

    /// Time left before the link expires at `now_ms`, `None` if it never does.
    pub fn lifetime_left(&self, now_ms: u64) -> Option<Duration> {
        self.expires_at.map(|at| {
            let at_ms = u64::try_from(at.timestamp_millis()).unwrap_or(0);
            Duration::from_millis(at_ms.saturating_sub(now_ms))
        })
    }

    /// Caps `ttl` so the entry never outlives its link.
    pub fn capped_ttl(&self, ttl: Duration, now_ms: u64) -> Duration {
        match self.lifetime_left(now_ms) {
            Some(left) => ttl.min(left),
            None => ttl,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.lifetime_left(now_ms).is_some_and(|left| left.is_zero())
    }
}

/// One tier of the resolution cache.
///
/// Implementations must be thread-safe and fail open: a backend error is
/// logged and reported as a miss (or a no-op for writes), never propagated
/// into the redirect path.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::LocalCache`] - bounded in-process L1
/// - [`crate::infrastructure::cache::RedisCache`] - shared L2
/// - [`crate::infrastructure::cache::NullCache`] - no-op
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Label used in logs and the cache-hit metric.
    fn tier(&self) -> &'static str;

    /// TTL applied when this tier is populated by the resolver.
    fn default_ttl(&self) -> Duration;

    /// Returns the entry for `key`, or `None` on miss, expiry or error.
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Stores `entry` under `key` for at most `ttl`.
    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) -> CacheResult<()>;

    /// Removes `key`. Called by the mutation path before it acknowledges.
    async fn invalidate(&self, key: &str) -> CacheResult<()>;

    /// Removes every entry owned by this tier.
    async fn clear(&self) -> CacheResult<()>;

    /// Number of entries currently held.
    async fn size(&self) -> CacheResult<usize>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;
}
