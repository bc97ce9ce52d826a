//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for persistence, caching and rate counters.
//!
//! # Modules
//!
//! - [`cache`] - Resolution cache tiers (local, Redis, no-op, tiered)
//! - [`persistence`] - Link repositories (PostgreSQL and in-memory)
//! - [`rate_limit`] - Counter stores (in-memory and Redis)

pub mod cache;
pub mod persistence;
pub mod rate_limit;
