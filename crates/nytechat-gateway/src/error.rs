//! HTTP error mapping. Every failure is rendered as `{"error": "<message>"}`.

use crate::rate_limit::apply_headers;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nytechat_core::{ErrorResponse, RateLimitStatus, RequestRejection, UpstreamError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Body did not decode as `{messages: [...]}`.
    #[error("Invalid request format. Messages array is required and must not be empty.")]
    Malformed,

    #[error(transparent)]
    Rejected(#[from] RequestRejection),

    #[error("Daily API limit exceeded. Service temporarily unavailable.")]
    QuotaExhausted(RateLimitStatus),

    #[error("Rate limit exceeded. Please try again later.")]
    ClientLimited(RateLimitStatus),

    #[error("API key not configured. Please check server configuration.")]
    MissingCredential,

    #[error("Failed to communicate with AI service. Please try again later.")]
    Upstream(#[source] UpstreamError),
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::MissingCredential => ApiError::MissingCredential,
            other => ApiError::Upstream(other),
        }
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Malformed | ApiError::Rejected(_) => StatusCode::BAD_REQUEST,
            ApiError::QuotaExhausted(_) | ApiError::ClientLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::MissingCredential | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });
        let mut res = (self.status_code(), body).into_response();
        if let ApiError::QuotaExhausted(status) | ApiError::ClientLimited(status) = &self {
            apply_headers(res.headers_mut(), status);
        }
        res
    }
}
