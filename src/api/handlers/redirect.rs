//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::api::middleware::rate_limit::client_ip;
use crate::domain::click_event::ClickEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its target URL.
///
/// # Endpoint
///
/// `GET /{code}`
///
/// # Request Flow
///
/// 1. Resolve through the cache tiers, falling back to persistence
/// 2. Queue a click event for the background worker
/// 3. Return 302 Found
///
/// Click tracking never delays the redirect. If the queue is full the click
/// is dropped.
///
/// # Errors
///
/// - 404 Not Found if the code is unknown or deleted
/// - 410 Gone if the link is expired or disabled
/// - 503 Service Unavailable if persistence timed out
pub async fn redirect_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<Response, AppError> {
    let resolution = state.redirect_service.resolve(&code).await?;

    let ip = client_ip(&headers, Some(addr), state.behind_proxy);
    let click_event = ClickEvent::new(
        resolution.link_id,
        code,
        Some(ip),
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok()),
        headers.get(header::REFERER).and_then(|v| v.to_str().ok()),
    );
    state.redirect_service.track_click(click_event);

    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, resolution.target)],
    )
        .into_response())
}
