//! Business logic services for the application layer.

pub mod link_service;
pub mod rate_limiter;
pub mod redirect_service;

pub use link_service::{CreateLink, LinkService};
pub use rate_limiter::{RateLimitDecision, RateLimitPolicy, RateLimiter, Tier, TierTable};
pub use redirect_service::{RedirectService, Resolution, ResolutionSnapshot};
