//! Crate-wide error taxonomy and its HTTP-class mapping.
//!
//! Every component surfaces failures as [`AppError`]. The variants mirror the
//! categories callers need to react to differently: terminal (`NotFound`,
//! `Gone`), retryable (`Timeout`), back-off (`RateLimitExceeded`) and caller
//! mistakes (`InvalidCharacter`, `Validation`).

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::fmt;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorInfo,
}

#[derive(Serialize)]
struct ErrorInfo {
    code: &'static str,
    message: String,
    details: Value,
}

/// Why a link that exists can no longer be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GoneReason {
    Expired,
    Disabled,
}

impl fmt::Display for GoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("link has expired"),
            Self::Disabled => f.write_str("link has been disabled"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid startup configuration. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid character '{character}' at position {position}")]
    InvalidCharacter { character: char, position: usize },

    #[error("{message}")]
    NotFound { message: String },

    #[error("{reason}")]
    Gone { reason: GoneReason },

    /// A backing store did not answer in time. Retryable.
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },

    #[error("rate limit of {limit} exceeded, resets at {reset_at}")]
    RateLimitExceeded { limit: u64, reset_at: DateTime<Utc> },

    #[error("{message}")]
    Validation { message: String, details: Value },

    #[error("{message}")]
    Conflict { message: String, details: Value },

    #[error("clock moved backwards: last timestamp {last}ms, now {now}ms")]
    ClockMovedBackwards { last: u64, now: u64 },

    #[error("{message}")]
    Internal { message: String },
}

impl AppError {
    pub fn bad_request(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>, details: Value) -> Self {
        Self::Conflict {
            message: message.into(),
            details,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true when the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::RateLimitExceeded { .. })
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::InvalidCharacter { .. } => (StatusCode::BAD_REQUEST, "invalid_character"),
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            Self::Gone { .. } => (StatusCode::GONE, "gone"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            Self::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            Self::Timeout { .. } => (StatusCode::SERVICE_UNAVAILABLE, "timeout"),
            Self::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            Self::ClockMovedBackwards { .. } | Self::Internal { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let retry_after = match &self {
            Self::RateLimitExceeded { reset_at, .. } => {
                Some((*reset_at - Utc::now()).num_seconds().max(1))
            }
            Self::Timeout { .. } => Some(1),
            _ => None,
        };

        let details = match &self {
            Self::Validation { details, .. } | Self::Conflict { details, .. } => details.clone(),
            Self::InvalidCharacter {
                character,
                position,
            } => json!({ "character": character.to_string(), "position": position }),
            Self::Gone { reason } => json!({ "reason": reason }),
            Self::RateLimitExceeded { limit, reset_at } => {
                json!({ "limit": limit, "reset_at": reset_at.to_rfc3339() })
            }
            Self::Timeout { operation } => json!({ "operation": operation, "retryable": true }),
            _ => json!({}),
        };

        // Internal details stay in the logs.
        let message = match &self {
            Self::Configuration(_) | Self::ClockMovedBackwards { .. } | Self::Internal { .. } => {
                tracing::error!(error = %self, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorInfo {
                code,
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::bad_request("Request validation failed", json!(errors))
    }
}

/// Translates database errors so no sqlx shape escapes the persistence layer.
pub fn map_sqlx_error(e: sqlx::Error) -> AppError {
    if let Some(db) = e.as_database_error()
        && db.is_unique_violation()
    {
        return AppError::conflict(
            "Unique constraint violation",
            json!({ "constraint": db.constraint() }),
        );
    }

    tracing::error!(error = %e, "database error");
    AppError::internal("Database error")
}
