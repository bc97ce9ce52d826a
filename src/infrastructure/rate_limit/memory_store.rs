//! In-process counter store on a concurrent map.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::repositories::CounterStore;
use crate::error::AppError;
use crate::utils::clock::SharedClock;

#[derive(Debug, Clone, Copy)]
struct Counter {
    count: u64,
    expires_at: u64,
}

/// Counter store for a single process.
///
/// An increment runs under the map's shard lock for that key, so concurrent
/// callers on one key always see distinct counts. When the map is full and a
/// new key arrives, expired counters are dropped first; if it is still full
/// the counter closest to expiry is evicted.
pub struct MemoryCounterStore {
    counters: DashMap<String, Counter>,
    max_keys: usize,
    clock: SharedClock,
}

impl MemoryCounterStore {
    pub fn new(max_keys: usize, clock: SharedClock) -> Self {
        Self {
            counters: DashMap::new(),
            max_keys: max_keys.max(1),
            clock,
        }
    }

    /// Removes every expired counter. Returns how many were dropped.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.counters.len();
        self.counters.retain(|_, c| c.expires_at > now);
        before.saturating_sub(self.counters.len())
    }

    /// Starts a background task that sweeps every `period`.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired();
                if removed > 0 {
                    debug!(removed, remaining = self.len(), "Swept expired rate counters");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    fn make_room(&self, now: u64) {
        self.counters.retain(|_, c| c.expires_at > now);
        if self.counters.len() < self.max_keys {
            return;
        }

        let victim = self
            .counters
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());
        if let Some(victim) = victim {
            warn!(key = %victim, "Rate counter store full, evicting earliest-expiring counter");
            self.counters.remove(&victim);
        }
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<u64, AppError> {
        let now = self.clock.now_millis();

        if !self.counters.contains_key(key) && self.counters.len() >= self.max_keys {
            self.make_room(now);
        }

        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            count: 0,
            expires_at: 0,
        });
        if counter.expires_at <= now {
            *counter = Counter {
                count: 0,
                expires_at: now.saturating_add(window.as_millis() as u64),
            };
        }
        counter.count += 1;
        Ok(counter.count)
    }

    async fn get(&self, key: &str) -> Result<u64, AppError> {
        let now = self.clock.now_millis();
        let live = self
            .counters
            .get(key)
            .map(|c| (c.count, c.expires_at > now));

        match live {
            Some((count, true)) => Ok(count),
            Some((_, false)) => {
                self.counters.remove_if(key, |_, c| c.expires_at <= now);
                Ok(0)
            }
            None => Ok(0),
        }
    }

    async fn reset(&self, key: &str) -> Result<(), AppError> {
        self.counters.remove(key);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;

    fn store(max_keys: usize) -> (Arc<MemoryCounterStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        (Arc::new(MemoryCounterStore::new(max_keys, clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_increment_counts_up() {
        let (store, _) = store(100);
        let window = Duration::from_secs(1);

        assert_eq!(store.increment("k", window).await.unwrap(), 1);
        assert_eq!(store.increment("k", window).await.unwrap(), 2);
        assert_eq!(store.increment("other", window).await.unwrap(), 1);
        assert_eq!(store.get("k").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_expired_counter_reads_zero_and_restarts() {
        let (store, clock) = store(100);
        let window = Duration::from_millis(500);

        store.increment("k", window).await.unwrap();
        store.increment("k", window).await.unwrap();

        clock.advance(500);
        assert_eq!(store.get("k").await.unwrap(), 0);
        assert_eq!(store.increment("k", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset() {
        let (store, _) = store(100);
        store.increment("k", Duration::from_secs(1)).await.unwrap();

        store.reset("k").await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired() {
        let (store, clock) = store(100);
        store.increment("short", Duration::from_millis(100)).await.unwrap();
        store.increment("long", Duration::from_secs(10)).await.unwrap();

        clock.advance(200);

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("long").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let (store, _) = store(16);

        for i in 0..500 {
            store
                .increment(&format!("k{i}"), Duration::from_secs(60))
                .await
                .unwrap();
        }

        assert!(store.len() <= 16);
        assert_eq!(store.get("k499").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_full_store_prefers_dropping_expired_counters() {
        let (store, clock) = store(2);
        store.increment("stale", Duration::from_millis(100)).await.unwrap();
        store.increment("live", Duration::from_secs(60)).await.unwrap();

        clock.advance(200);
        store.increment("fresh", Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("live").await.unwrap(), 1);
        assert_eq!(store.get("fresh").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_distinct() {
        let (store, _) = store(100);
        let mut handles = Vec::new();

        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..100 {
                    seen.push(store.increment("hot", Duration::from_secs(60)).await.unwrap());
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        all.dedup();

        assert_eq!(all.len(), 800);
        assert_eq!(store.get("hot").await.unwrap(), 800);
    }
}
