//! Ordered composition of cache tiers.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::service::{CacheEntry, CacheService};
use crate::utils::clock::SharedClock;

/// A hit together with the tier that served it.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub tier: &'static str,
}

/// Cache tiers consulted in order, fastest first.
///
/// A hit in tier `n` is written back into tiers `0..n` with each tier's own
/// TTL, capped at the link's expiry. An entry whose link has expired is
/// dropped and counts as a miss, as do tier errors. Invalidation and clear
/// fan out to every tier.
pub struct TieredCache {
    tiers: Vec<Arc<dyn CacheService>>,
    clock: SharedClock,
}

impl TieredCache {
    pub fn new(tiers: Vec<Arc<dyn CacheService>>, clock: SharedClock) -> Self {
        Self { tiers, clock }
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }

    pub async fn lookup(&self, key: &str) -> Option<CacheHit> {
        for (index, tier) in self.tiers.iter().enumerate() {
            let entry = match tier.get(key).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(tier = tier.tier(), "Cache lookup failed for {}: {}", key, e);
                    continue;
                }
            };

            let now = self.clock.now_millis();
            if entry.is_expired(now) {
                if let Err(e) = tier.invalidate(key).await {
                    warn!(tier = tier.tier(), "Cache invalidate failed for {}: {}", key, e);
                }
                continue;
            }

            if index > 0 {
                let mut fresh = entry.clone();
                fresh.cached_at = now;
                for upper in &self.tiers[..index] {
                    let ttl = fresh.capped_ttl(upper.default_ttl(), now);
                    if let Err(e) = upper.put(key, fresh.clone(), ttl).await {
                        warn!(tier = upper.tier(), "Cache backfill failed for {}: {}", key, e);
                    }
                }
            }

            return Some(CacheHit {
                entry,
                tier: tier.tier(),
            });
        }
        None
    }

    /// Writes `entry` into every tier with that tier's default TTL, capped at
    /// `max_ttl` when the underlying link expires sooner.
    pub async fn populate(&self, key: &str, entry: CacheEntry, max_ttl: Option<Duration>) {
        for tier in &self.tiers {
            let ttl = match max_ttl {
                Some(cap) => tier.default_ttl().min(cap),
                None => tier.default_ttl(),
            };
            if let Err(e) = tier.put(key, entry.clone(), ttl).await {
                warn!(tier = tier.tier(), "Cache populate failed for {}: {}", key, e);
            }
        }
    }

    pub async fn invalidate(&self, key: &str) {
        for tier in &self.tiers {
            if let Err(e) = tier.invalidate(key).await {
                warn!(tier = tier.tier(), "Cache invalidate failed for {}: {}", key, e);
            }
        }
    }

    pub async fn clear(&self) {
        for tier in &self.tiers {
            if let Err(e) = tier.clear().await {
                warn!(tier = tier.tier(), "Cache clear failed: {}", e);
            }
        }
    }

    /// Number of entries in the first tier.
    pub async fn local_size(&self) -> usize {
        match self.tiers.first() {
            Some(tier) => tier.size().await.unwrap_or(0),
            None => 0,
        }
    }

    /// `true` when every tier reports healthy.
    pub async fn health_check(&self) -> bool {
        for tier in &self.tiers {
            if !tier.health_check().await {
                return false;
            }
        }
        true
    }
}
