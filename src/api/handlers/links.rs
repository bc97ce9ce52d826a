//! Handlers for link management endpoints (create, read, update, delete).

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::json;
use validator::Validate;

use crate::api::dto::links::{CreateLinkRequest, LinkResponse, UpdateLinkRequest};
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short link.
///
/// # Endpoint
///
/// `POST /api/links`
///
/// # Request Body
///
/// ```json
/// {
///   "target": "https://example.com/landing",
///   "custom_alias": "promo",                 // optional
///   "expires_at": "2030-01-01T00:00:00Z"     // optional
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request if validation fails
/// - 409 Conflict if the alias is taken
pub async fn create_link_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkResponse>), AppError> {
    payload.validate()?;

    let link = state.link_service.create(payload.into()).await?;
    let short_url = state.short_url(&link.short_code);

    Ok((StatusCode::CREATED, Json(LinkResponse::new(link, short_url))))
}

/// Returns a link by identifier.
///
/// # Endpoint
///
/// `GET /api/links/{id}`
pub async fn get_link_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LinkResponse>, AppError> {
    let link = state.link_service.get(parse_id(&id)?).await?;
    let short_url = state.short_url(&link.short_code);

    Ok(Json(LinkResponse::new(link, short_url)))
}

/// Partially updates a link.
///
/// # Endpoint
///
/// `PATCH /api/links/{id}`
///
/// The short code is invalidated in every cache tier before the response is
/// sent.
///
/// # Errors
///
/// - 404 Not Found if the link doesn't exist or was deleted
/// - 400 Bad Request if validation fails or the body changes nothing
pub async fn update_link_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<Json<LinkResponse>, AppError> {
    payload.validate()?;

    let link = state
        .link_service
        .update(parse_id(&id)?, payload.into())
        .await?;
    let short_url = state.short_url(&link.short_code);

    Ok(Json(LinkResponse::new(link, short_url)))
}

/// Soft-deletes a link.
///
/// # Endpoint
///
/// `DELETE /api/links/{id}`
///
/// # Response
///
/// 204 No Content on success.
pub async fn delete_link_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.link_service.soft_delete(parse_id(&id)?).await?;

    Ok(StatusCode::NO_CONTENT)
}

fn parse_id(raw: &str) -> Result<u64, AppError> {
    raw.parse().map_err(|_| {
        AppError::bad_request(
            "Link id must be an unsigned 64-bit integer",
            json!({ "id": raw }),
        )
    })
}
