//! Tiered fixed-window rate limiting middleware.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::SecondsFormat;
use std::net::SocketAddr;
use tracing::warn;

use crate::application::services::{RateLimitDecision, Tier};
use crate::error::AppError;
use crate::state::AppState;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Who is calling, as established by an authentication layer in front of
/// this one.
///
/// Requests without this extension are limited per client IP on the
/// [`Tier::Free`] tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub id: String,
    pub tier: Tier,
}

/// Counts the request against its caller's window.
///
/// # Response Headers
///
/// Every response passing through, allowed or not, carries:
///
/// ```text
/// X-RateLimit-Limit: 10
/// X-RateLimit-Remaining: 7
/// X-RateLimit-Reset: 2026-01-01T13:00:00Z
/// ```
///
/// Rejected requests get `429 Too Many Requests` with `Retry-After`.
/// Callers on an unlimited tier get no headers.
///
/// # Failure Mode
///
/// If the counter store errors or times out the request is let through
/// without headers.
///
/// # Example
///
/// ```rust,ignore
/// let api = Router::new()
///     .route("/links", post(create_link_handler))
///     .layer(middleware::from_fn_with_state(state.clone(), rate_limit::layer));
/// ```
pub async fn layer(State(st): State<AppState>, req: Request, next: Next) -> Response {
    let (identifier, tier) = match req.extensions().get::<CallerIdentity>() {
        Some(caller) => (caller.id.clone(), caller.tier),
        None => {
            let peer = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr);
            (client_ip(req.headers(), peer, st.behind_proxy), Tier::Free)
        }
    };

    let decision = match st.rate_limiter.check_limit(&identifier, tier).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(
                identifier,
                %tier,
                error = %e,
                "Rate limit check failed, allowing request"
            );
            return next.run(req).await;
        }
    };

    let mut response = if decision.allowed {
        next.run(req).await
    } else {
        AppError::RateLimitExceeded {
            limit: decision.limit,
            reset_at: decision.reset_at,
        }
        .into_response()
    };

    if !decision.is_unlimited() {
        apply_headers(response.headers_mut(), &decision);
    }
    response
}

fn apply_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    let reset = decision
        .reset_at
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    if let Ok(value) = HeaderValue::from_str(&reset) {
        headers.insert(X_RATELIMIT_RESET, value);
    }
}

/// Best-effort client address.
///
/// Forwarding headers are only trusted when `behind_proxy` is set; the
/// first `X-Forwarded-For` hop wins over `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, behind_proxy: bool) -> String {
    if behind_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            return ip.trim().to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_client_ip_ignores_forwarding_headers_by_default() {
        let peer: SocketAddr = "10.0.0.7:51000".parse().unwrap();
        let map = headers(&[("x-forwarded-for", "203.0.113.9")]);

        assert_eq!(client_ip(&map, Some(peer), false), "10.0.0.7");
    }

    #[test]
    fn test_client_ip_behind_proxy() {
        let peer: SocketAddr = "10.0.0.7:51000".parse().unwrap();

        let forwarded = headers(&[
            ("x-forwarded-for", "203.0.113.9, 10.0.0.1"),
            ("x-real-ip", "198.51.100.2"),
        ]);
        assert_eq!(client_ip(&forwarded, Some(peer), true), "203.0.113.9");

        let real_ip = headers(&[("x-real-ip", "198.51.100.2")]);
        assert_eq!(client_ip(&real_ip, Some(peer), true), "198.51.100.2");

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer), true), "10.0.0.7");
    }

    #[test]
    fn test_client_ip_without_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), None, false), "unknown");
    }
}
