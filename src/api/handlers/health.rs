//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Components Checked
///
/// 1. **Storage**: repository round trip
/// 2. **Cache**: every tier answers its health probe
/// 3. **Click Queue**: channel is open, reports free slots
/// 4. **Rate limit**: active counter backend
///
/// Cache hit and miss totals are reported alongside under `resolution`.
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let storage_check = check_storage(&state).await;

    let cache_check = check_cache(&state).await;

    let queue_check = check_click_queue(&state);

    let rate_limit_check = CheckStatus::ok(format!(
        "{} counters",
        state.rate_limiter.backend()
    ));

    let all_healthy = storage_check.is_ok() && cache_check.is_ok() && queue_check.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            storage: storage_check,
            cache: cache_check,
            click_queue: queue_check,
            rate_limit: rate_limit_check,
        },
        resolution: state.redirect_service.stats(),
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_storage(state: &AppState) -> CheckStatus {
    if state.repository.health_check().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Storage unreachable")
    }
}

async fn check_cache(state: &AppState) -> CheckStatus {
    let tiers = state.cache.tier_names().join(",");
    if state.cache.health_check().await {
        CheckStatus::ok(format!(
            "Tiers: {tiers}, local entries: {}",
            state.cache.local_size().await
        ))
    } else {
        CheckStatus::error(format!("A cache tier is unreachable (tiers: {tiers})"))
    }
}

/// Checks if the click tracking queue is operational.
fn check_click_queue(state: &AppState) -> CheckStatus {
    if state.redirect_service.click_queue_open() {
        CheckStatus::ok(format!(
            "Capacity: {}",
            state.redirect_service.click_queue_capacity()
        ))
    } else {
        CheckStatus::error("Click queue is closed")
    }
}
