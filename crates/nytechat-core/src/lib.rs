//! nytechat core library.
//! Personas, command routing, chat session state, admission control and the upstream bridge
//! shared by the gateway and the terminal client.

pub mod admission;
pub mod command;
pub mod config;
pub mod error;
pub mod guard;
pub mod message;
pub mod persona;
pub mod prefs;
pub mod segment;
pub mod session;
pub mod upstream;

pub use admission::{start_sweeper, ClientRateLimiter, Decision, ProcessQuota, RateLimitStatus, UsageWindow};
pub use command::{route, Command, CommandResult, RouteContext, Soundtrack, StateChange, COMMAND_MARKER};
pub use config::{upstream_api_key, GatewayConfig};
pub use error::{ConfigError, MessageTooLong, PreferencesError, RequestRejection, UpstreamError};
pub use guard::{check_message_length, contains_suspicious_content, validate_chat_request, MAX_MESSAGE_LENGTH};
pub use message::{ChatRequest, ChatResponse, ErrorResponse, Message, Role, WireMessage};
pub use persona::{Persona, PersonaId, Theme, CORTANA, NYTEMODE};
pub use prefs::Preferences;
pub use segment::{render_links_html, rewrite_links, segment, Segment, SegmentKind};
pub use session::{ChatSession, ConnectionStatus, Submission};
pub use upstream::{ChatProvider, XaiClient, EMPTY_REPLY};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
