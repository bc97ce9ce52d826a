//! Short code resolution on the redirect path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::infrastructure::cache::{CacheEntry, TieredCache};
use crate::utils::clock::SharedClock;

const SLOW_RESOLUTION: Duration = Duration::from_millis(100);

/// A short code that may be followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: String,
    pub link_id: u64,
    /// Tier that answered, or `None` when persistence did.
    pub served_by: Option<&'static str>,
}

/// In-process hit/miss counters.
#[derive(Debug, Default)]
pub struct ResolutionStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl ResolutionStats {
    pub fn snapshot(&self) -> ResolutionSnapshot {
        ResolutionSnapshot {
            cache_hits: self.hits.load(Ordering::Relaxed),
            cache_misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Answers "what does this short code point to right now".
///
/// Consults the cache tiers first. On a miss it reads persistence under a
/// timeout, rejects deleted, expired and disabled links without caching
/// them, and writes resolvable links back into every tier.
pub struct RedirectService<L: LinkRepository + ?Sized> {
    repository: Arc<L>,
    cache: Arc<TieredCache>,
    clock: SharedClock,
    lookup_timeout: Duration,
    click_tx: mpsc::Sender<ClickEvent>,
    stats: ResolutionStats,
}

impl<L: LinkRepository + ?Sized> RedirectService<L> {
    pub fn new(
        repository: Arc<L>,
        cache: Arc<TieredCache>,
        clock: SharedClock,
        lookup_timeout: Duration,
        click_tx: mpsc::Sender<ClickEvent>,
    ) -> Self {
        Self {
            repository,
            cache,
            clock,
            lookup_timeout,
            click_tx,
            stats: ResolutionStats::default(),
        }
    }

    pub fn stats(&self) -> ResolutionSnapshot {
        self.stats.snapshot()
    }

    /// Whether the click worker is still receiving events.
    pub fn click_queue_open(&self) -> bool {
        !self.click_tx.is_closed()
    }

    /// Free slots left in the click queue.
    pub fn click_queue_capacity(&self) -> usize {
        self.click_tx.capacity()
    }

    /// Resolves `code` to its target.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the code is unknown or its link is deleted
    /// - [`AppError::Gone`] if the link is expired or disabled
    /// - [`AppError::Timeout`] if persistence does not answer in time
    pub async fn resolve(&self, code: &str) -> Result<Resolution, AppError> {
        let started = Instant::now();
        let result = self.resolve_inner(code).await;

        let elapsed = started.elapsed();
        metrics::histogram!("link_resolver_resolution_seconds").record(elapsed.as_secs_f64());
        if elapsed > SLOW_RESOLUTION {
            warn!(
                code,
                elapsed_ms = elapsed.as_millis() as u64,
                "Slow resolution"
            );
        }

        result
    }

    async fn resolve_inner(&self, code: &str) -> Result<Resolution, AppError> {
        if let Some(hit) = self.cache.lookup(code).await {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("link_resolver_cache_hits_total", "tier" => hit.tier).increment(1);
            debug!(code, tier = hit.tier, "Resolved from cache");

            return Ok(Resolution {
                target: hit.entry.target,
                link_id: hit.entry.link_id,
                served_by: Some(hit.tier),
            });
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("link_resolver_cache_misses_total").increment(1);

        let link = tokio::time::timeout(
            self.lookup_timeout,
            self.repository.find_by_short_code(code),
        )
        .await
        .map_err(|_| AppError::Timeout {
            operation: "link lookup",
        })??
        .ok_or_else(|| AppError::not_found("Short link not found"))?;

        let now_ms = self.clock.now_millis();
        let now = self.clock.now_utc();
        link.ensure_resolvable(now)?;

        let max_ttl = link
            .expires_at
            .and_then(|at| (at - now).to_std().ok());
        self.cache
            .populate(code, CacheEntry::from_link(&link, now_ms), max_ttl)
            .await;

        Ok(Resolution {
            target: link.target,
            link_id: link.id,
            served_by: None,
        })
    }

    /// Queues click accounting without waiting. A full or closed queue drops
    /// the event.
    pub fn track_click(&self, event: ClickEvent) {
        match self.click_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                metrics::counter!("link_resolver_clicks_dropped_total").increment(1);
                warn!(link_id = event.link_id, "Click queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                metrics::counter!("link_resolver_clicks_dropped_total").increment(1);
                warn!(link_id = event.link_id, "Click worker stopped, dropping event");
            }
        }
    }
}
