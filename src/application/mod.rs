//! Application layer services implementing business logic.
//!
//! This layer orchestrates domain operations by coordinating repository calls,
//! cache tiers, validation and rate limits. Services consume repository traits
//! and provide a clean API for HTTP handlers.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Link creation and mutation
//! - [`services::redirect_service::RedirectService`] - Cached short code resolution
//! - [`services::rate_limiter::RateLimiter`] - Tiered fixed-window limits

pub mod services;
