//! Input guards: per-message length ceiling and `/api/chat` request validation.

use crate::error::{MessageTooLong, RequestRejection};
use crate::message::{ChatRequest, Role};
use once_cell::sync::Lazy;
use regex::Regex;

/// Character ceiling for one submitted line, applied to commands and chat alike.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Patterns that block the most recent user message (script injection, exploit requests).
static SUSPICIOUS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)^\s*[<{]\s*script",
        r"(?i)^\s*[<{]\s*iframe",
        r"(?i)create\s+a\s+(malicious|virus|malware)",
        r"(?i)\bsql\s+injection\b",
        r"(?i)\bhack\s+(into|the|a)\b",
        r"(?i)\bexploit\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("suspicious pattern"))
    .collect()
});

pub fn check_message_length(input: &str) -> Result<(), MessageTooLong> {
    let length = input.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(MessageTooLong {
            length,
            max: MAX_MESSAGE_LENGTH,
        });
    }
    Ok(())
}

pub fn contains_suspicious_content(text: &str) -> bool {
    SUSPICIOUS_PATTERNS.iter().any(|re| re.is_match(text))
}

/// Shape, size and content checks for a proxy request. Only the last user message is
/// run through the content filter.
pub fn validate_chat_request(req: &ChatRequest, max_messages: usize) -> Result<(), RequestRejection> {
    if req.messages.is_empty() {
        return Err(RequestRejection::EmptyConversation);
    }
    if req.messages.len() > max_messages {
        return Err(RequestRejection::TooManyMessages {
            count: req.messages.len(),
            max: max_messages,
        });
    }
    let last_user = req.messages.iter().rev().find(|m| m.role == Role::User);
    if let Some(msg) = last_user {
        if contains_suspicious_content(&msg.content) {
            return Err(RequestRejection::SuspiciousContent);
        }
    }
    Ok(())
}
