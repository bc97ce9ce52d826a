//! Repository trait for short link persistence.

use crate::domain::entities::{Link, LinkPatch, NewLink};
use crate::error::AppError;
use async_trait::async_trait;

/// Durable store of links, addressed by identifier or unique short code.
///
/// The store must enforce short-code uniqueness itself: custom aliases are
/// caller-supplied and nothing upstream can rule out a collision.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgLinkRepository`] - PostgreSQL
/// - [`crate::infrastructure::persistence::MemoryLinkRepository`] - in-process map
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Finds a link by short code, including soft-deleted ones.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn find_by_short_code(&self, code: &str) -> Result<Option<Link>, AppError>;

    /// Finds a link by identifier, including soft-deleted ones.
    async fn find_by_id(&self, id: u64) -> Result<Option<Link>, AppError>;

    /// Persists a new link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the id or short code already exists.
    async fn create(&self, new_link: NewLink) -> Result<Link, AppError>;

    /// Applies a partial update and returns the updated link.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no link has this id.
    async fn update(&self, id: u64, patch: LinkPatch) -> Result<Link, AppError>;

    /// Marks a link as deleted.
    ///
    /// Returns `Ok(false)` if no live link had this id.
    async fn soft_delete(&self, id: u64) -> Result<bool, AppError>;

    /// Adds one to the link's click counter.
    async fn increment_click_count(&self, id: u64) -> Result<(), AppError>;

    /// Reports whether the store is reachable.
    async fn health_check(&self) -> bool {
        true
    }
}
