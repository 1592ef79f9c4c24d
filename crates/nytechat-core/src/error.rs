//! Error types for the nytechat core.

use thiserror::Error;

/// Reasons a `/api/chat` body is refused before any upstream call. Display strings are
/// returned to the caller verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestRejection {
    #[error("Invalid request format. Messages array is required and must not be empty.")]
    EmptyConversation,

    #[error("Too many messages in conversation history. Please start a new conversation.")]
    TooManyMessages { count: usize, max: usize },

    #[error("Your request contains potentially harmful content and has been blocked.")]
    SuspiciousContent,
}

/// Input over the per-message character ceiling; rejected before command routing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ERROR: Message exceeds maximum length of {max} characters. Please send a shorter message.")]
pub struct MessageTooLong {
    pub length: usize,
    pub max: usize,
}

/// Errors talking to the upstream chat-completion provider.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("API key not configured. Please check server configuration.")]
    MissingCredential,

    #[error("upstream request: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("upstream response parse: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config load failed: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Error, Debug)]
pub enum PreferencesError {
    #[error("preferences io: {0}")]
    Io(#[from] std::io::Error),

    #[error("preferences parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("preferences encode: {0}")]
    Encode(#[from] toml::ser::Error),
}
