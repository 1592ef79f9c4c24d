//! Client-side chat session: display log, upstream history and the active persona/theme.
//!
//! Only one upstream request may be outstanding; submissions made while one is pending
//! are ignored, so replies are always appended in submission order.

use crate::command::{route, CommandResult, RouteContext, StateChange};
use crate::guard::check_message_length;
use crate::message::{ChatRequest, Message, Role, WireMessage};
use crate::persona::{Persona, PersonaId, Theme};
use crate::prefs::Preferences;
use chrono::{DateTime, Local};
use std::fmt;
use tracing::{debug, warn};

const BOOT_LINES: [&str; 4] = [
    "nytechat interface v1.0",
    "Initializing system...",
    "Connecting to nytemode AI...",
    "Connection established. Type your message and press ENTER to communicate with nytemode AI.",
];

const UPSTREAM_FAILURE: &str = "I can't let you do that, Starfox.\n\n\
ERROR: Connection to AI service failed. Please check your network connection and try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Online,
    Processing,
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionStatus::Online => "ONLINE",
            ConnectionStatus::Processing => "PROCESSING",
            ConnectionStatus::Disconnected => "DISCONNECTED",
        })
    }
}

/// What the caller should do after [`ChatSession::submit`].
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Blank input, or the immersive view is up.
    Ignored,
    /// A request is already in flight.
    Busy,
    /// Over the length ceiling; an error line was appended.
    TooLong,
    /// A command was routed and applied; returned for UI side effects.
    Command(CommandResult),
    /// Send this to the gateway, then call [`ChatSession::complete`].
    Send(ChatRequest),
}

#[derive(Debug, Clone, Default)]
pub struct ChatSession {
    persona: PersonaId,
    theme: Theme,
    connection: ConnectionStatus,
    immersive: bool,
    pending: bool,
    log: Vec<Message>,
    history: Vec<Message>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn persona(&self) -> &'static Persona {
        Persona::get(self.persona)
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn is_immersive(&self) -> bool {
        self.immersive
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Everything shown on screen, oldest first.
    pub fn log(&self) -> &[Message] {
        &self.log
    }

    /// Turns that are sent upstream as context.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn boot(&mut self, now: DateTime<Local>) {
        let base = now.timestamp_millis();
        for (i, line) in BOOT_LINES.iter().enumerate() {
            self.log.push(Message::assistant(*line, base + 500 * i as i64));
        }
    }

    pub fn submit(&mut self, input: &str, now: DateTime<Local>) -> Submission {
        let trimmed = input.trim();
        if trimmed.is_empty() || self.immersive {
            return Submission::Ignored;
        }
        if self.pending {
            return Submission::Busy;
        }
        let ts = now.timestamp_millis();
        if let Err(e) = check_message_length(trimmed) {
            self.log.push(Message::assistant(e.to_string(), ts));
            return Submission::TooLong;
        }

        let ctx = RouteContext {
            persona: self.persona,
            theme: self.theme,
            connection: self.connection,
            now,
        };
        match route(trimmed, &ctx) {
            CommandResult::PassThrough(text) => Submission::Send(self.begin_request(text, ts)),
            result => {
                self.apply(&result, ts);
                Submission::Command(result)
            }
        }
    }

    /// Records the upstream outcome for the outstanding request. Ignored when no request
    /// is pending.
    pub fn complete<E: fmt::Display>(&mut self, outcome: Result<String, E>, now: DateTime<Local>) {
        if !self.pending {
            debug!(target: "nytechat::session", "Dropping upstream outcome with no request pending");
            return;
        }
        let ts = now.timestamp_millis();
        self.pending = false;
        match outcome {
            Ok(reply) => {
                let msg = Message::assistant(reply, ts);
                self.log.push(msg.clone());
                self.history.push(msg);
                self.connection = ConnectionStatus::Online;
            }
            Err(e) => {
                warn!(target: "nytechat::session", "Upstream request failed: {}", e);
                self.log.push(Message::assistant(UPSTREAM_FAILURE, ts));
                self.connection = ConnectionStatus::Disconnected;
            }
        }
    }

    pub fn close_immersive(&mut self) {
        self.immersive = false;
    }

    /// Snapshot for persistence. Personas that opt out of persistence are left unset.
    pub fn preferences(&self) -> Preferences {
        let persona = self.persona();
        Preferences {
            theme: Some(self.theme),
            persona: persona.persistable.then_some(persona.id),
        }
    }

    pub fn restore(&mut self, prefs: &Preferences) {
        if let Some(theme) = prefs.theme.filter(Theme::is_user_selectable) {
            self.theme = theme;
        }
        if let Some(id) = prefs.persona.filter(|id| Persona::get(*id).persistable) {
            self.persona = id;
        }
        debug!(target: "nytechat::session", "Restored persona={:?} theme={}", self.persona, self.theme);
    }

    fn begin_request(&mut self, text: String, ts: i64) -> ChatRequest {
        let msg = Message::user(text, ts);
        self.log.push(msg.clone());
        self.history.push(msg);
        self.pending = true;
        self.connection = ConnectionStatus::Processing;

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(WireMessage::new(Role::System, self.persona().system_prompt));
        messages.extend(self.history.iter().map(Message::to_wire));
        ChatRequest { messages }
    }

    fn apply(&mut self, result: &CommandResult, ts: i64) {
        match result {
            CommandResult::Reply(text) | CommandResult::Unrecognized(text) => {
                self.log.push(Message::assistant(text.clone(), ts));
            }
            CommandResult::StateChange(change) => self.apply_change(change, ts),
            CommandResult::Immersive => self.immersive = true,
            CommandResult::PassThrough(_) => {}
        }
    }

    fn apply_change(&mut self, change: &StateChange, ts: i64) {
        if let Some(id) = change.persona {
            self.persona = id;
        }
        if let Some(theme) = change.theme {
            self.theme = theme;
        }
        let lines = change
            .messages
            .iter()
            .enumerate()
            .map(|(i, text)| Message::assistant(text.clone(), ts + 100 * i as i64));
        if change.clear_history {
            self.log = lines.collect();
            self.history.clear();
        } else {
            self.log.extend(lines);
        }
    }
}
