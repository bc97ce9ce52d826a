//! Resolution cache tiers.
//!
//! Provides a [`CacheService`] trait with three implementations and a
//! composition over them:
//! - [`LocalCache`] - bounded in-process L1 with TTL and FIFO/LRU eviction
//! - [`RedisCache`] - shared L2
//! - [`NullCache`] - no-op tier
//! - [`TieredCache`] - ordered lookup with backfill and fan-out invalidation

mod local_cache;
mod null_cache;
mod redis_cache;
mod service;
mod tiered;

pub use local_cache::{EvictionPolicy, LocalCache};
pub use null_cache::NullCache;
pub use redis_cache::RedisCache;
pub use service::{CacheEntry, CacheError, CacheResult, CacheService};
pub use tiered::{CacheHit, TieredCache};
