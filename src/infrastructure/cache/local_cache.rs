//! Bounded, TTL-checked in-process cache (L1).

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use super::service::{CacheEntry, CacheResult, CacheService};
use crate::error::AppError;
use crate::utils::clock::SharedClock;

/// Which entry gives way when a new key arrives at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Oldest insertion goes first; reads never promote.
    #[default]
    Fifo,
    /// Least recently read or written goes first.
    Lru,
}

impl FromStr for EvictionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lru" => Ok(Self::Lru),
            other => Err(AppError::Configuration(format!(
                "unknown cache eviction policy '{other}', expected fifo or lru"
            ))),
        }
    }
}

impl fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => f.write_str("fifo"),
            Self::Lru => f.write_str("lru"),
        }
    }
}

struct Slot {
    entry: CacheEntry,
    expires_at: u64,
    tick: u64,
}

/// Map plus an eviction index ordered by tick. Under FIFO a slot's tick is
/// set once on insertion; under LRU it is refreshed on every hit and write.
#[derive(Default)]
struct Inner {
    slots: HashMap<String, Slot>,
    order: BTreeMap<u64, String>,
    next_tick: u64,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some(slot) => {
                self.order.remove(&slot.tick);
                true
            }
            None => false,
        }
    }

    fn evict_one(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.slots.remove(&key);
        Some(key)
    }
}

/// The resolution cache's first tier.
///
/// All operations take one mutex, so `get`/`put`/`invalidate` on the same key
/// are linearizable and readers never see a partially written entry. An entry
/// is never served once `cached_at + ttl <= now`; expired entries found by
/// `get` are removed on the spot.
pub struct LocalCache {
    inner: Mutex<Inner>,
    max_size: usize,
    default_ttl: Duration,
    policy: EvictionPolicy,
    clock: SharedClock,
}

impl LocalCache {
    pub fn new(
        max_size: usize,
        default_ttl: Duration,
        policy: EvictionPolicy,
        clock: SharedClock,
    ) -> Self {
        debug!(max_size, ttl_ms = default_ttl.as_millis() as u64, %policy, "Using LocalCache");
        Self {
            inner: Mutex::new(Inner::default()),
            max_size: max_size.max(1),
            default_ttl,
            policy,
            clock,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_millis();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.slots.get(key) {
            None => return None,
            Some(slot) => slot.expires_at <= now,
        };

        if expired {
            inner.remove(key);
            debug!(key, "LocalCache EXPIRED");
            return None;
        }

        if self.policy == EvictionPolicy::Lru {
            let tick = inner.bump();
            if let Some(slot) = inner.slots.get_mut(key) {
                let old = std::mem::replace(&mut slot.tick, tick);
                inner.order.remove(&old);
                inner.order.insert(tick, key.to_string());
            }
        }

        inner.slots.get(key).map(|slot| slot.entry.clone())
    }

    pub fn insert(&self, key: &str, entry: CacheEntry, ttl: Duration) {
        let expires_at = entry.cached_at.saturating_add(ttl.as_millis() as u64);
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(slot) = inner.slots.get_mut(key) {
            slot.entry = entry;
            slot.expires_at = expires_at;
            if self.policy == EvictionPolicy::Lru {
                let tick = inner.next_tick;
                inner.next_tick += 1;
                let old = std::mem::replace(&mut slot.tick, tick);
                inner.order.remove(&old);
                inner.order.insert(tick, key.to_string());
            }
            return;
        }

        if inner.slots.len() >= self.max_size
            && let Some(evicted) = inner.evict_one()
        {
            debug!(evicted = %evicted, "LocalCache EVICT");
        }

        let tick = inner.bump();
        inner.order.insert(tick, key.to_string());
        inner.slots.insert(
            key.to_string(),
            Slot {
                entry,
                expires_at,
                tick,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key)
    }

    pub fn purge(&self) {
        let mut inner = self.inner.lock();
        inner.slots.clear();
        inner.order.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheService for LocalCache {
    fn tier(&self) -> &'static str {
        "l1"
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        Ok(self.lookup(key))
    }

    async fn put(&self, key: &str, entry: CacheEntry, ttl: Duration) -> CacheResult<()> {
        self.insert(key, entry, ttl);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> CacheResult<()> {
        self.remove(key);
        Ok(())
    }

    async fn clear(&self) -> CacheResult<()> {
        self.purge();
        Ok(())
    }

    async fn size(&self) -> CacheResult<usize> {
        Ok(self.len())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::LinkStatus;
    use crate::utils::clock::{Clock, ManualClock, SystemClock};
    use std::sync::Arc;

    fn entry(id: u64, now: u64) -> CacheEntry {
        CacheEntry {
            target: format!("https://example.com/{id}"),
            link_id: id,
            status: LinkStatus::Active,
            cached_at: now,
            expires_at: None,
        }
    }

    fn manual_cache(max: usize, policy: EvictionPolicy) -> (LocalCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = LocalCache::new(max, Duration::from_millis(50), policy, clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_get_after_put() {
        let (cache, clock) = manual_cache(10, EvictionPolicy::Fifo);
        let e = entry(1, clock.now_millis());

        cache.insert("a", e.clone(), Duration::from_millis(50));

        assert_eq!(cache.lookup("a"), Some(e));
        assert_eq!(cache.lookup("missing"), None);
    }

    #[test]
    fn test_entry_expires_at_cached_at_plus_ttl() {
        let (cache, clock) = manual_cache(10, EvictionPolicy::Fifo);
        cache.insert("a", entry(1, clock.now_millis()), Duration::from_millis(50));

        clock.advance(49);
        assert!(cache.lookup("a").is_some());

        clock.advance(1);
        assert!(cache.lookup("a").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_expiry_with_real_clock() {
        let clock: SharedClock = Arc::new(SystemClock);
        let cache = LocalCache::new(
            10,
            Duration::from_millis(50),
            EvictionPolicy::Fifo,
            clock.clone(),
        );

        cache
            .put("k", entry(1, clock.now_millis()), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(cache.get("k").await.unwrap().is_some());
        assert_eq!(cache.size().await.unwrap(), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("k").await.unwrap().is_none());
        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[test]
    fn test_fifo_evicts_exactly_one_oldest_insert() {
        let (cache, clock) = manual_cache(3, EvictionPolicy::Fifo);
        let now = clock.now_millis();
        let ttl = Duration::from_secs(60);

        cache.insert("a", entry(1, now), ttl);
        cache.insert("b", entry(2, now), ttl);
        cache.insert("c", entry(3, now), ttl);
        // A read does not save "a" under FIFO.
        assert!(cache.lookup("a").is_some());

        cache.insert("d", entry(4, now), ttl);

        assert_eq!(cache.len(), 3);
        assert!(cache.lookup("a").is_none());
        assert!(cache.lookup("b").is_some());
        assert!(cache.lookup("c").is_some());
        assert!(cache.lookup("d").is_some());
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let (cache, clock) = manual_cache(3, EvictionPolicy::Lru);
        let now = clock.now_millis();
        let ttl = Duration::from_secs(60);

        cache.insert("a", entry(1, now), ttl);
        cache.insert("b", entry(2, now), ttl);
        cache.insert("c", entry(3, now), ttl);
        assert!(cache.lookup("a").is_some());

        cache.insert("d", entry(4, now), ttl);

        assert_eq!(cache.len(), 3);
        assert!(cache.lookup("a").is_some());
        assert!(cache.lookup("b").is_none());
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let (cache, clock) = manual_cache(2, EvictionPolicy::Fifo);
        let now = clock.now_millis();
        let ttl = Duration::from_secs(60);

        cache.insert("a", entry(1, now), ttl);
        cache.insert("b", entry(2, now), ttl);
        cache.insert("a", entry(10, now), ttl);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup("a").unwrap().link_id, 10);
        assert!(cache.lookup("b").is_some());
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let (cache, clock) = manual_cache(16, EvictionPolicy::Fifo);
        let now = clock.now_millis();

        for i in 0..200u64 {
            cache.insert(&format!("k{i}"), entry(i, now), Duration::from_secs(60));
            assert!(cache.len() <= 16);
        }
        assert_eq!(cache.len(), 16);
        assert!(cache.lookup("k199").is_some());
        assert!(cache.lookup("k183").is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let (cache, clock) = manual_cache(10, EvictionPolicy::Fifo);
        let now = clock.now_millis();
        let ttl = Duration::from_secs(60);

        cache.insert("a", entry(1, now), ttl);
        cache.insert("b", entry(2, now), ttl);

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert!(cache.lookup("a").is_none());

        cache.purge();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_access_keeps_bound() {
        let clock: SharedClock = Arc::new(SystemClock);
        let cache = Arc::new(LocalCache::new(
            64,
            Duration::from_secs(5),
            EvictionPolicy::Lru,
            clock.clone(),
        ));

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let cache = cache.clone();
                let clock = clock.clone();
                std::thread::spawn(move || {
                    for i in 0..500u64 {
                        let key = format!("k{}", (t * 31 + i) % 128);
                        cache.insert(&key, entry(i, clock.now_millis()), Duration::from_secs(5));
                        if let Some(e) = cache.lookup(&key) {
                            assert_eq!(e.target, format!("https://example.com/{}", e.link_id));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 64);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("LRU".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Lru);
        assert_eq!("fifo".parse::<EvictionPolicy>().unwrap(), EvictionPolicy::Fifo);
        assert!("random".parse::<EvictionPolicy>().is_err());
    }
}
