//! Link creation, lookup and mutation service.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;

use crate::domain::entities::{Link, LinkPatch, LinkStatus, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::AppError;
use crate::infrastructure::cache::TieredCache;
use crate::utils::base62::Base62Codec;
use crate::utils::clock::SharedClock;
use crate::utils::code_generator::{generate_code, validate_custom_alias};
use crate::utils::snowflake::IdGenerator;
use crate::utils::url_validator::sanitize_target;

/// Input for [`LinkService::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateLink {
    pub target: String,
    pub custom_alias: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Service for creating and managing short links.
///
/// Every mutation invalidates the link's short code in all cache tiers
/// before it returns, so a caller that has seen the acknowledgement will not
/// be served the old target by this process.
pub struct LinkService<L: LinkRepository + ?Sized> {
    repository: Arc<L>,
    generator: Arc<IdGenerator>,
    codec: Base62Codec,
    cache: Arc<TieredCache>,
    clock: SharedClock,
}

impl<L: LinkRepository + ?Sized> LinkService<L> {
    pub fn new(
        repository: Arc<L>,
        generator: Arc<IdGenerator>,
        codec: Base62Codec,
        cache: Arc<TieredCache>,
        clock: SharedClock,
    ) -> Self {
        Self {
            repository,
            generator,
            codec,
            cache,
            clock,
        }
    }

    pub fn codec(&self) -> &Base62Codec {
        &self.codec
    }

    /// Creates a short link.
    ///
    /// Without an alias the short code is the base62 form of a fresh
    /// identifier. With one, the alias is validated and checked for
    /// collisions; the identifier is still minted so every link has one.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if:
    /// - the target is not an absolute http(s) URL
    /// - the alias breaks the alias rules
    /// - `expires_at` is in the past
    ///
    /// Returns [`AppError::Conflict`] if the alias is already taken.
    pub async fn create(&self, input: CreateLink) -> Result<Link, AppError> {
        let target = sanitize_target(&input.target).map_err(|e| {
            AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
        })?;

        if let Some(expires_at) = input.expires_at
            && expires_at <= self.clock.now_utc()
        {
            return Err(AppError::bad_request(
                "Expiry must be in the future",
                json!({ "expires_at": expires_at.to_rfc3339() }),
            ));
        }

        let (id, short_code) = match input.custom_alias {
            Some(alias) => {
                validate_custom_alias(&alias)?;
                if self.repository.find_by_short_code(&alias).await?.is_some() {
                    return Err(AppError::conflict(
                        "Custom alias already exists",
                        json!({ "alias": alias }),
                    ));
                }
                (self.generator.generate()?, alias)
            }
            None => generate_code(&self.generator, &self.codec)?,
        };

        let link = self
            .repository
            .create(NewLink {
                id,
                short_code,
                target,
                expires_at: input.expires_at,
            })
            .await?;

        metrics::counter!("link_resolver_links_created_total").increment(1);
        info!(id = link.id, code = %link.short_code, "Link created");
        Ok(link)
    }

    /// Fetches a live link by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if it does not exist or was deleted.
    pub async fn get(&self, id: u64) -> Result<Link, AppError> {
        self.repository
            .find_by_id(id)
            .await?
            .filter(|link| !link.is_deleted())
            .ok_or_else(|| AppError::not_found("Link not found"))
    }

    /// Applies `patch` and invalidates the cached resolution.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an empty patch, an invalid target
    /// or an attempt to set `DELETED` (use [`Self::soft_delete`]).
    /// Returns [`AppError::NotFound`] if the link does not exist or was deleted.
    pub async fn update(&self, id: u64, mut patch: LinkPatch) -> Result<Link, AppError> {
        if patch.is_empty() {
            return Err(AppError::bad_request("Nothing to update", json!({})));
        }
        if patch.status == Some(LinkStatus::Deleted) {
            return Err(AppError::bad_request(
                "Use DELETE to remove a link",
                json!({ "status": LinkStatus::Deleted.as_str() }),
            ));
        }
        if let Some(target) = patch.target.take() {
            let sanitized = sanitize_target(&target).map_err(|e| {
                AppError::bad_request("Invalid URL format", json!({ "reason": e.to_string() }))
            })?;
            patch.target = Some(sanitized);
        }

        self.get(id).await?;
        let link = self.repository.update(id, patch).await?;
        self.cache.invalidate(&link.short_code).await;

        info!(id, code = %link.short_code, status = %link.status, "Link updated");
        Ok(link)
    }

    /// Soft-deletes a link and invalidates the cached resolution.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the link does not exist or was
    /// already deleted.
    pub async fn soft_delete(&self, id: u64) -> Result<(), AppError> {
        let link = self.get(id).await?;

        if !self.repository.soft_delete(id).await? {
            return Err(AppError::not_found("Link not found"));
        }
        self.cache.invalidate(&link.short_code).await;

        info!(id, code = %link.short_code, "Link deleted");
        Ok(())
    }
}
