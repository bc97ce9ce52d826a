//! PostgreSQL implementation of link repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

use crate::domain::entities::{Link, LinkPatch, LinkStatus, NewLink};
use crate::domain::repositories::LinkRepository;
use crate::error::{AppError, map_sqlx_error};

const LINK_COLUMNS: &str =
    "id, short_code, target, status, expires_at, click_count, created_at, updated_at";

#[derive(Debug, FromRow)]
struct LinkRow {
    id: i64,
    short_code: String,
    target: String,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    click_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LinkRow> for Link {
    type Error = AppError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        Ok(Link {
            id: row.id as u64,
            short_code: row.short_code,
            target: row.target,
            status: row.status.parse()?,
            expires_at: row.expires_at,
            click_count: row.click_count.max(0) as u64,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// PostgreSQL repository for link storage and retrieval.
///
/// Identifiers are stored as `BIGINT`; snowflake ids stay below 2^63 so the
/// cast is lossless. Short-code uniqueness is enforced by `links_short_code_key`.
pub struct PgLinkRepository {
    pool: Arc<PgPool>,
}

impl PgLinkRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkRepository for PgLinkRepository {
    async fn find_by_short_code(&self, code: &str) -> Result<Option<Link>, AppError> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM links WHERE short_code = $1");
        let row = sqlx::query_as::<_, LinkRow>(&sql)
            .bind(code)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(map_sqlx_error)?;

        row.map(Link::try_from).transpose()
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Link>, AppError> {
        let sql = format!("SELECT {LINK_COLUMNS} FROM links WHERE id = $1");
        let row = sqlx::query_as::<_, LinkRow>(&sql)
            .bind(id as i64)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(map_sqlx_error)?;

        row.map(Link::try_from).transpose()
    }

    async fn create(&self, new_link: NewLink) -> Result<Link, AppError> {
        let sql = format!(
            "INSERT INTO links (id, short_code, target, expires_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {LINK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, LinkRow>(&sql)
            .bind(new_link.id as i64)
            .bind(&new_link.short_code)
            .bind(&new_link.target)
            .bind(new_link.expires_at)
            .fetch_one(self.pool.as_ref())
            .await
            .map_err(map_sqlx_error)?;

        Link::try_from(row)
    }

    async fn update(&self, id: u64, patch: LinkPatch) -> Result<Link, AppError> {
        let sql = format!(
            "UPDATE links SET \
                 target = COALESCE($2, target), \
                 status = COALESCE($3, status), \
                 expires_at = CASE WHEN $4 THEN $5 ELSE expires_at END, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {LINK_COLUMNS}"
        );
        let row = sqlx::query_as::<_, LinkRow>(&sql)
            .bind(id as i64)
            .bind(patch.target)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.expires_at.is_some())
            .bind(patch.expires_at.flatten())
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Link::try_from(row),
            None => Err(AppError::not_found("Link not found")),
        }
    }

    async fn soft_delete(&self, id: u64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE links SET status = $2, updated_at = NOW() WHERE id = $1 AND status <> $2",
        )
        .bind(id as i64)
        .bind(LinkStatus::Deleted.as_str())
        .execute(self.pool.as_ref())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_click_count(&self, id: u64) -> Result<(), AppError> {
        sqlx::query("UPDATE links SET click_count = click_count + 1 WHERE id = $1")
            .bind(id as i64)
            .execute(self.pool.as_ref())
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}
