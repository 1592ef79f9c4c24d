//! Per-client admission for `/api/*` and the `X-RateLimit-*` headers.

use crate::error::ApiError;
use crate::AppState;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use nytechat_core::{Decision, RateLimitStatus};
use std::net::SocketAddr;
use tracing::debug;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

pub async fn limit_clients(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(request.headers(), connect.map(|ConnectInfo(addr)| addr));
    match state.limiter.admit(&key) {
        Decision::Rejected(status) => ApiError::ClientLimited(status).into_response(),
        Decision::Allowed(status) => {
            debug!(target: "nytechat::gateway", "Client {} admitted ({} remaining)", key, status.remaining);
            let mut res = next.run(request).await;
            // A process-quota rejection already carries its own headers.
            if !res.headers().contains_key(LIMIT_HEADER) {
                apply_headers(res.headers_mut(), &status);
            }
            res
        }
        Decision::Exempt => next.run(request).await,
    }
}

/// First `X-Forwarded-For` entry, else the peer address, else `"unknown"`.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn apply_headers(headers: &mut HeaderMap, status: &RateLimitStatus) {
    headers.insert(LIMIT_HEADER, HeaderValue::from(status.limit));
    headers.insert(REMAINING_HEADER, HeaderValue::from(status.remaining));
    headers.insert(RESET_HEADER, HeaderValue::from(status.reset_epoch_secs()));
}
