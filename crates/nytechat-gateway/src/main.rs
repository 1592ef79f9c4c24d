//! nytechat gateway: chat proxy in front of the xAI completion API.
//! `POST /api/chat` (per-client limited, process quota), `GET /health`.

mod error;
mod handlers;
mod rate_limit;

use axum::{
    http::Method,
    middleware,
    routing::{get, post},
    Router,
};
use nytechat_core::{
    start_sweeper, upstream_api_key, ChatProvider, ClientRateLimiter, GatewayConfig, ProcessQuota,
    XaiClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub quota: Arc<ProcessQuota>,
    pub limiter: Arc<ClientRateLimiter>,
    pub provider: Arc<dyn ChatProvider>,
}

impl AppState {
    pub fn new(config: GatewayConfig, provider: Arc<dyn ChatProvider>) -> Self {
        let quota = ProcessQuota::new(config.daily_request_limit, config.daily_window());
        let limiter = ClientRateLimiter::new(config.client_request_limit, config.client_window())
            .with_whitelist(config.client_whitelist.iter().cloned());
        Self {
            config: Arc::new(config),
            quota: Arc::new(quota),
            limiter: Arc::new(limiter),
            provider,
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/chat", post(handlers::chat))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit::limit_clients));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[nytechat-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!(target: "nytechat::gateway", "{}", e);
            std::process::exit(1);
        }
    };

    let api_key = upstream_api_key();
    if api_key.is_none() {
        warn!(
            target: "nytechat::gateway",
            "GROK_API_KEY / XAI_API_KEY not set; /api/chat will answer 500 until configured"
        );
    }
    let provider: Arc<dyn ChatProvider> = match XaiClient::new(api_key, &config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(target: "nytechat::gateway", "Upstream client init failed: {}", e);
            std::process::exit(1);
        }
    };
    let addr = config.bind_addr();
    let sweep_every = config.sweep_interval();

    let state = AppState::new(config, provider);
    let _sweeper = start_sweeper(Arc::clone(&state.limiter), sweep_every);
    let app = build_app(state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(target: "nytechat::gateway", "Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    info!(target: "nytechat::gateway", "nytechat gateway v{} listening on {}", nytechat_core::version(), addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    {
        error!(target: "nytechat::gateway", "Server error: {}", e);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(target: "nytechat::gateway", "Ctrl-C handler failed: {}", e);
    }
    info!(target: "nytechat::gateway", "Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limit::{LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use nytechat_core::{UpstreamError, WireMessage};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct ScriptedProvider {
        configured: bool,
        fail: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn ok() -> Arc<Self> {
            Arc::new(Self { configured: true, fail: false, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn complete(&self, messages: &[WireMessage]) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(UpstreamError::Status { status: 502, body: "bad gateway".into() });
            }
            Ok(format!("echo {}", messages.len()))
        }
    }

    fn app_with(config: GatewayConfig, provider: Arc<ScriptedProvider>) -> Router {
        build_app(AppState::new(config, provider))
    }

    fn chat_request(body: Value) -> Request<Body> {
        chat_request_from(body, "198.51.100.4")
    }

    fn chat_request_from(body: Value, client: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .header("x-forwarded-for", client)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn hello() -> Value {
        json!({"messages": [
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hello"}
        ]})
    }

    async fn json_body(res: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let app = app_with(GatewayConfig::default(), ScriptedProvider::ok());
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get(LIMIT_HEADER).is_none());
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn chat_success_carries_rate_limit_headers() {
        let provider = ScriptedProvider::ok();
        let app = app_with(GatewayConfig::default(), provider.clone());
        let res = app.oneshot(chat_request(hello())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[LIMIT_HEADER], "25");
        assert_eq!(res.headers()[REMAINING_HEADER], "24");
        assert!(res.headers().contains_key(RESET_HEADER));
        assert_eq!(json_body(res).await, json!({"response": "echo 2"}));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_bodies_are_400() {
        let provider = ScriptedProvider::ok();
        let app = app_with(GatewayConfig::default(), provider.clone());

        let res = app.clone().oneshot(chat_request(json!({"messages": []}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await["error"],
            "Invalid request format. Messages array is required and must not be empty."
        );

        let res = app.clone().oneshot(chat_request(json!({"prompt": "hi"}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let many: Vec<Value> = (0..51).map(|_| json!({"role": "user", "content": "hi"})).collect();
        let res = app.clone().oneshot(chat_request(json!({"messages": many}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await["error"],
            "Too many messages in conversation history. Please start a new conversation."
        );

        let res = app
            .oneshot(chat_request(json!({"messages": [
                {"role": "user", "content": "<script>alert(1)</script>"}
            ]})))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await["error"],
            "Your request contains potentially harmful content and has been blocked."
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_credential_is_500_before_validation() {
        let provider = Arc::new(ScriptedProvider { configured: false, fail: false, calls: AtomicUsize::new(0) });
        let app = app_with(GatewayConfig::default(), provider);
        let res = app.oneshot(chat_request(json!({"messages": []}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(res).await["error"],
            "API key not configured. Please check server configuration."
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_500() {
        let provider = Arc::new(ScriptedProvider { configured: true, fail: true, calls: AtomicUsize::new(0) });
        let app = app_with(GatewayConfig::default(), provider);
        let res = app.oneshot(chat_request(hello())).await.unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(res).await["error"],
            "Failed to communicate with AI service. Please try again later."
        );
    }

    #[tokio::test]
    async fn process_quota_exhaustion_is_429() {
        let provider = ScriptedProvider::ok();
        let config = GatewayConfig { daily_request_limit: 2, ..GatewayConfig::default() };
        let app = app_with(config, provider.clone());

        for client in ["10.0.0.1", "10.0.0.2"] {
            let res = app.clone().oneshot(chat_request_from(hello(), client)).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app.oneshot(chat_request_from(hello(), "10.0.0.3")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()[LIMIT_HEADER], "2");
        assert_eq!(res.headers()[REMAINING_HEADER], "0");
        assert_eq!(
            json_body(res).await["error"],
            "Daily API limit exceeded. Service temporarily unavailable."
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_quota_wins_over_bad_body() {
        let provider = ScriptedProvider::ok();
        let config = GatewayConfig { daily_request_limit: 1, ..GatewayConfig::default() };
        let app = app_with(config, provider);

        let res = app.clone().oneshot(chat_request(hello())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let res = app.oneshot(chat_request(json!({"messages": []}))).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()[REMAINING_HEADER], "0");
        assert_eq!(
            json_body(res).await["error"],
            "Daily API limit exceeded. Service temporarily unavailable."
        );
    }

    #[tokio::test]
    async fn exhausted_quota_wins_over_missing_credential() {
        let provider = Arc::new(ScriptedProvider { configured: false, fail: false, calls: AtomicUsize::new(0) });
        let config = GatewayConfig { daily_request_limit: 0, ..GatewayConfig::default() };
        let app = app_with(config, provider);
        let res = app.oneshot(chat_request(hello())).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn rejected_bodies_do_not_consume_quota() {
        let provider = ScriptedProvider::ok();
        let config = GatewayConfig { daily_request_limit: 1, ..GatewayConfig::default() };
        let app = app_with(config, provider.clone());

        for _ in 0..3 {
            let res = app.clone().oneshot(chat_request(json!({"messages": []}))).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        }
        let res = app.oneshot(chat_request(hello())).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn per_client_limit_is_429_and_isolated() {
        let provider = ScriptedProvider::ok();
        let config = GatewayConfig { client_request_limit: 2, ..GatewayConfig::default() };
        let app = app_with(config, provider.clone());

        for _ in 0..2 {
            let res = app.clone().oneshot(chat_request_from(hello(), "10.1.1.1")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app.clone().oneshot(chat_request_from(hello(), "10.1.1.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()[LIMIT_HEADER], "2");
        assert_eq!(res.headers()[REMAINING_HEADER], "0");
        assert_eq!(json_body(res).await["error"], "Rate limit exceeded. Please try again later.");

        let res = app.oneshot(chat_request_from(hello(), "10.1.1.2")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn whitelisted_client_is_not_limited() {
        let config = GatewayConfig {
            client_request_limit: 1,
            client_whitelist: vec!["10.9.9.9".to_string()],
            ..GatewayConfig::default()
        };
        let app = app_with(config, ScriptedProvider::ok());
        for _ in 0..3 {
            let res = app.clone().oneshot(chat_request_from(hello(), "10.9.9.9")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            assert!(res.headers().get(LIMIT_HEADER).is_none());
        }
    }
}
