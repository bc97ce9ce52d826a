//! API route configuration.

use crate::api::handlers::{
    create_link_handler, delete_link_handler, get_link_handler, update_link_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// Link management routes, mounted under `/api`.
///
/// # Endpoints
///
/// - `POST   /links`        - Create a short link
/// - `GET    /links/{id}`   - Fetch a link by identifier
/// - `PATCH  /links/{id}`   - Partially update a link (target, status, expiry)
/// - `DELETE /links/{id}`   - Soft-delete a link
pub fn link_routes() -> Router<AppState> {
    Router::new().route("/links", post(create_link_handler)).route(
        "/links/{id}",
        get(get_link_handler)
            .patch(update_link_handler)
            .delete(delete_link_handler),
    )
}
