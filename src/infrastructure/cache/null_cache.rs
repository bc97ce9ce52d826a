//! No-op cache tier.

use std::time::Duration;

use super::service::{CacheEntry, CacheResult, CacheService};
use async_trait::async_trait;
use tracing::debug;

/// A cache tier that stores nothing.
///
/// Stands in for L2 when no `REDIS_URL` is configured or Redis is
/// unreachable at startup, so the resolver always works with the same
/// tier list.
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        debug!("Using NullCache (shared cache disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for NullCache {
    fn tier(&self) -> &'static str {
        "null"
    }

    fn default_ttl(&self) -> Duration {
        Duration::ZERO
    }

    async fn get(&self, _short_code: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(None)
    }

    async fn put(&self, _short_code: &str, _entry: CacheEntry, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn invalidate(&self, _short_code: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn size(&self) -> CacheResult<usize> {
        Ok(0)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
