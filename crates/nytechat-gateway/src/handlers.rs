use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use nytechat_core::{validate_chat_request, ChatRequest, ChatResponse, Decision};
use tracing::{error, info, warn};

pub async fn health() -> &'static str {
    "OK"
}

/// `POST /api/chat`: quota exhausted, credential, validation, counted admission, then
/// one upstream call.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    if let Decision::Rejected(status) = state.quota.check() {
        return Err(ApiError::QuotaExhausted(status));
    }

    if !state.provider.is_configured() {
        error!(target: "nytechat::gateway", "Upstream API key is not configured");
        return Err(ApiError::MissingCredential);
    }

    let Json(req) = payload.map_err(|e| {
        warn!(target: "nytechat::gateway", "Rejected chat body: {}", e.body_text());
        ApiError::Malformed
    })?;
    validate_chat_request(&req, state.config.max_conversation_messages).map_err(|e| {
        warn!(target: "nytechat::gateway", "Rejected chat request: {:?}", e);
        e
    })?;

    // Counted here so concurrent requests cannot overshoot the ceiling.
    if let Decision::Rejected(status) = state.quota.admit() {
        return Err(ApiError::QuotaExhausted(status));
    }

    info!(target: "nytechat::gateway", "Forwarding {} messages upstream", req.messages.len());
    let reply = state.provider.complete(&req.messages).await.map_err(|e| {
        error!(target: "nytechat::gateway", "Upstream call failed: {}", e);
        ApiError::from(e)
    })?;

    Ok(Json(ChatResponse { response: reply }))
}
