//! Link entity: a short code bound to a target URL.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, GoneReason};

/// Lifecycle state of a link as stored by persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    #[default]
    Active,
    Disabled,
    Expired,
    Deleted,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Disabled => "DISABLED",
            Self::Expired => "EXPIRED",
            Self::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "DISABLED" => Ok(Self::Disabled),
            "EXPIRED" => Ok(Self::Expired),
            "DELETED" => Ok(Self::Deleted),
            other => Err(AppError::internal(format!("unknown link status '{other}'"))),
        }
    }
}

/// A stored short link.
///
/// `id` is the snowflake identifier. For generated links `short_code` is its
/// base62 encoding; for custom aliases the two are unrelated.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: u64,
    pub short_code: String,
    pub target: String,
    pub status: LinkStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub click_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Link {
    /// Creates an active link with no expiry and zero clicks.
    pub fn new(id: u64, short_code: String, target: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            short_code,
            target,
            status: LinkStatus::Active,
            expires_at: None,
            click_count: 0,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == LinkStatus::Deleted
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == LinkStatus::Expired || self.expires_at.is_some_and(|e| now >= e)
    }

    /// Checks whether the link may be followed at `now`.
    ///
    /// # Errors
    ///
    /// - [`AppError::NotFound`] if the link is soft-deleted
    /// - [`AppError::Gone`] if it is expired or disabled
    pub fn ensure_resolvable(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        if self.is_deleted() {
            return Err(AppError::not_found("Link not found"));
        }
        if self.is_expired_at(now) {
            return Err(AppError::Gone {
                reason: GoneReason::Expired,
            });
        }
        if self.status == LinkStatus::Disabled {
            return Err(AppError::Gone {
                reason: GoneReason::Disabled,
            });
        }
        Ok(())
    }
}

/// Input data for persisting a new link.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub id: u64,
    pub short_code: String,
    pub target: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Partial update for an existing link.
///
/// `None` fields are left unchanged.
/// `expires_at: Some(None)` clears the expiry; `Some(Some(t))` sets it.
#[derive(Debug, Clone, Default)]
pub struct LinkPatch {
    pub target: Option<String>,
    pub status: Option<LinkStatus>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl LinkPatch {
    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.status.is_none() && self.expires_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link() -> Link {
        Link::new(
            42,
            "000000G".to_string(),
            "https://example.com".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_link_is_active_and_resolvable() {
        let link = link();
        assert_eq!(link.status, LinkStatus::Active);
        assert_eq!(link.click_count, 0);
        assert!(link.ensure_resolvable(Utc::now()).is_ok());
    }

    #[test]
    fn test_deleted_link_is_not_found() {
        let mut link = link();
        link.status = LinkStatus::Deleted;
        assert!(matches!(
            link.ensure_resolvable(Utc::now()),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_disabled_link_is_gone() {
        let mut link = link();
        link.status = LinkStatus::Disabled;
        assert!(matches!(
            link.ensure_resolvable(Utc::now()),
            Err(AppError::Gone {
                reason: GoneReason::Disabled
            })
        ));
    }

    #[test]
    fn test_expiry_by_timestamp_and_status() {
        let now = Utc::now();
        let mut link = link();
        link.expires_at = Some(now - Duration::seconds(1));
        assert!(matches!(
            link.ensure_resolvable(now),
            Err(AppError::Gone {
                reason: GoneReason::Expired
            })
        ));

        let mut link = self::link();
        link.status = LinkStatus::Expired;
        assert!(link.is_expired_at(now));

        let mut link = self::link();
        link.expires_at = Some(now + Duration::hours(1));
        assert!(link.ensure_resolvable(now).is_ok());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            LinkStatus::Active,
            LinkStatus::Disabled,
            LinkStatus::Expired,
            LinkStatus::Deleted,
        ] {
            assert_eq!(status.as_str().parse::<LinkStatus>().unwrap(), status);
        }
        assert!("archived".parse::<LinkStatus>().is_err());
    }

    #[test]
    fn test_empty_patch() {
        assert!(LinkPatch::default().is_empty());
        let patch = LinkPatch {
            status: Some(LinkStatus::Disabled),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
