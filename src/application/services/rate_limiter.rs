//! Tenant-tiered fixed-window rate limiting.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::repositories::CounterStore;
use crate::error::AppError;
use crate::utils::clock::SharedClock;

const HOUR: Duration = Duration::from_secs(60 * 60);

/// Caller classification governing which limit applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    #[default]
    Free,
    Paid,
    Enterprise,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "paid" => Ok(Self::Paid),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(AppError::Configuration(format!("unknown tier '{other}'"))),
        }
    }
}

/// Ceiling and window length for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u64,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub const fn new(limit: u64, window: Duration) -> Self {
        Self { limit, window }
    }

    /// A policy no caller can exceed.
    pub const fn unlimited(window: Duration) -> Self {
        Self {
            limit: u64::MAX,
            window,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == u64::MAX
    }
}

/// Limits for every tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTable {
    pub free: RateLimitPolicy,
    pub paid: RateLimitPolicy,
    pub enterprise: RateLimitPolicy,
}

impl TierTable {
    pub fn policy(&self, tier: Tier) -> RateLimitPolicy {
        match tier {
            Tier::Free => self.free,
            Tier::Paid => self.paid,
            Tier::Enterprise => self.enterprise,
        }
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            free: RateLimitPolicy::new(10, HOUR),
            paid: RateLimitPolicy::new(1000, HOUR),
            enterprise: RateLimitPolicy::unlimited(HOUR),
        }
    }
}

/// Outcome of one counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Decision for a tier without a ceiling; nothing was counted.
    pub fn unlimited(reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            limit: u64::MAX,
            remaining: u64::MAX,
            reset_at,
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.limit == u64::MAX
    }
}

/// Fixed-window limiter over a pluggable [`CounterStore`].
///
/// Windows are aligned to multiples of the tier's window length since the
/// Unix epoch. The request that brings the count to exactly `limit` is
/// allowed; the next one in the same window is not. Up to `2 * limit`
/// requests can pass across a window boundary.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    tiers: TierTable,
    clock: SharedClock,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, tiers: TierTable, clock: SharedClock) -> Self {
        Self {
            store,
            tiers,
            clock,
        }
    }

    pub fn tiers(&self) -> &TierTable {
        &self.tiers
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Counts one request for `identifier` and reports whether it fits.
    /// Unlimited tiers are allowed without touching the store.
    ///
    /// # Errors
    ///
    /// Propagates counter store failures, including [`AppError::Timeout`].
    pub async fn check_limit(
        &self,
        identifier: &str,
        tier: Tier,
    ) -> Result<RateLimitDecision, AppError> {
        let policy = self.tiers.policy(tier);
        let window_ms = (policy.window.as_millis() as u64).max(1);
        let now = self.clock.now_millis();
        let window_index = now / window_ms;

        let reset_ms = (window_index + 1).saturating_mul(window_ms);
        let reset_at = i64::try_from(reset_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        if policy.is_unlimited() {
            return Ok(RateLimitDecision::unlimited(reset_at));
        }

        let key = window_key(tier, identifier, window_index);
        let count = self.store.increment(&key, policy.window).await?;

        let allowed = count <= policy.limit;
        if !allowed {
            debug!(identifier, %tier, count, "Rate limit exceeded");
            metrics::counter!("link_resolver_rate_limit_rejections_total", "tier" => tier.as_str())
                .increment(1);
        }

        Ok(RateLimitDecision {
            allowed,
            limit: policy.limit,
            remaining: policy.limit.saturating_sub(count),
            reset_at,
        })
    }

    /// Clears the current window's counter for `identifier`.
    pub async fn reset(&self, identifier: &str, tier: Tier) -> Result<(), AppError> {
        let window_ms = (self.tiers.policy(tier).window.as_millis() as u64).max(1);
        let key = window_key(tier, identifier, self.clock.now_millis() / window_ms);
        self.store.reset(&key).await
    }
}

fn window_key(tier: Tier, identifier: &str, window_index: u64) -> String {
    format!("rate:{}:{}:{}", tier.as_str(), identifier, window_index)
}
