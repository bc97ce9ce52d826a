//! DTOs for link management endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use validator::Validate;

use crate::application::services::CreateLink;
use crate::domain::entities::{Link, LinkPatch, LinkStatus};

/// Request body for `POST /api/links`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLinkRequest {
    /// Destination URL (absolute `http` or `https`).
    #[validate(url(message = "Invalid URL format"))]
    pub target: String,

    /// Optional caller-chosen short code.
    #[validate(length(min = 3, max = 20, message = "Alias must be 3-20 characters"))]
    pub custom_alias: Option<String>,

    /// After this instant the link answers 410 Gone.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<CreateLinkRequest> for CreateLink {
    fn from(req: CreateLinkRequest) -> Self {
        Self {
            target: req.target,
            custom_alias: req.custom_alias,
            expires_at: req.expires_at,
        }
    }
}

/// Request body for `PATCH /api/links/{id}`.
///
/// Only provided fields are changed.
///
/// # `expires_at` semantics
///
/// - **Absent** → leave existing value unchanged
/// - **`null`** → clear expiry
/// - **Timestamp** → set new expiry
#[serde_as]
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLinkRequest {
    #[validate(url(message = "Invalid URL format"))]
    pub target: Option<String>,

    /// `ACTIVE`, `DISABLED` or `EXPIRED`. Deletion goes through `DELETE`.
    pub status: Option<LinkStatus>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl From<UpdateLinkRequest> for LinkPatch {
    fn from(req: UpdateLinkRequest) -> Self {
        Self {
            target: req.target,
            status: req.status,
            expires_at: req.expires_at,
        }
    }
}

/// JSON representation of a link.
///
/// `id` is rendered as a string; 64-bit identifiers do not survive a trip
/// through JavaScript numbers.
#[derive(Debug, Serialize, Deserialize)]
pub struct LinkResponse {
    pub id: String,
    pub short_code: String,
    pub short_url: String,
    pub target: String,
    pub status: LinkStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub click_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkResponse {
    pub fn new(link: Link, short_url: String) -> Self {
        Self {
            id: link.id.to_string(),
            short_code: link.short_code,
            short_url,
            target: link.target,
            status: link.status,
            expires_at: link.expires_at,
            click_count: link.click_count,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}
