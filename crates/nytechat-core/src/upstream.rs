//! Upstream bridge: forwards the conversation to an OpenAI-compatible chat-completion
//! endpoint (xAI by default) and returns the first choice's text.
//!
//! One request per call, no retries; the HTTP client timeout bounds each call.

use crate::config::GatewayConfig;
use crate::error::UpstreamError;
use crate::message::WireMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Reply used when the provider answers without any choice text.
pub const EMPTY_REPLY: &str = "I couldn't process that request. Please try again.";

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// False when no credential is available; the gateway answers 500 before validating.
    fn is_configured(&self) -> bool;

    async fn complete(&self, messages: &[WireMessage]) -> Result<String, UpstreamError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [WireMessage],
    model: &'a str,
    stream: bool,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

pub struct XaiClient {
    api_key: Option<String>,
    url: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl XaiClient {
    /// Fails only when the HTTP client cannot be built (e.g. no TLS backend).
    pub fn new(api_key: Option<String>, config: &GatewayConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .build()?;
        Ok(Self {
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            url: config.upstream_url.clone(),
            model: config.upstream_model.clone(),
            temperature: config.upstream_temperature,
            client,
        })
    }
}

#[async_trait]
impl ChatProvider for XaiClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, messages: &[WireMessage]) -> Result<String, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::MissingCredential)?;
        let body = CompletionRequest {
            messages,
            model: &self.model,
            stream: false,
            temperature: self.temperature,
        };

        let res = self
            .client
            .post(&self.url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        let text = res.text().await?;
        info!(target: "nytechat::upstream", "Upstream responded {}", status);

        if !status.is_success() {
            error!(target: "nytechat::upstream", "Upstream error {}: {}", status, text);
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&text)?;
        Ok(first_choice_text(parsed))
    }
}

fn first_choice_text(parsed: CompletionResponse) -> String {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| EMPTY_REPLY.to_string())
}
