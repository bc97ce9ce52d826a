//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{code}`      - Short link redirect
//! - `GET  /health`      - Health check: storage, cache tiers, click queue
//! - `/api/*`            - Link management
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Tiered fixed window on `/api/*`, optionally on redirects

use crate::api;
use crate::api::handlers::{health_handler, redirect_handler};
use crate::api::middleware::{rate_limit, tracing};
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `rate_limit_redirects` - when `true`, `GET /{code}` is counted against
///   the caller's tier and carries `X-RateLimit-*` headers as well
pub fn app_router(state: AppState, rate_limit_redirects: bool) -> Router {
    let limiter = middleware::from_fn_with_state(state.clone(), rate_limit::layer);

    let api_router = api::routes::link_routes().route_layer(limiter.clone());

    let mut redirect_router = Router::new().route("/{code}", get(redirect_handler));
    if rate_limit_redirects {
        redirect_router = redirect_router.route_layer(limiter);
    }

    Router::new()
        .merge(redirect_router)
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(tracing::layer())
}
