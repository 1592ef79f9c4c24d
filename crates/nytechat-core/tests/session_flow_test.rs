//! Integration test: a terminal session driven end to end against a scripted provider.
//!
//! ## Scenarios
//! 1. Boot, chat, theme switch and clear keep the log append-only between clears.
//! 2. Persona switch resets history and changes the system prompt sent upstream.
//! 3. Requests built by the session pass gateway validation.
//! 4. Preferences survive a save/load/restore cycle, except the pinned persona.

use async_trait::async_trait;
use chrono::Local;
use nytechat_core::{
    segment, validate_chat_request, ChatProvider, ChatSession, PersonaId, Preferences, Role,
    Submission, Theme, UpstreamError, WireMessage, CORTANA,
};
use std::sync::Mutex;

/// Echoes the last user message and records every request it sees.
struct EchoProvider {
    seen: Mutex<Vec<Vec<WireMessage>>>,
}

#[async_trait]
impl ChatProvider for EchoProvider {
    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, messages: &[WireMessage]) -> Result<String, UpstreamError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("echo: {}\n```sh\necho {}\n```", last, last))
    }
}

async fn say(session: &mut ChatSession, provider: &EchoProvider, text: &str) {
    match session.submit(text, Local::now()) {
        Submission::Send(req) => {
            validate_chat_request(&req, 50).expect("session builds valid requests");
            let reply = provider.complete(&req.messages).await;
            session.complete(reply, Local::now());
        }
        other => panic!("expected a send for {:?}, got {:?}", text, other),
    }
}

#[tokio::test]
async fn chat_commands_and_clear() {
    let provider = EchoProvider { seen: Mutex::new(Vec::new()) };
    let mut session = ChatSession::new();
    session.boot(Local::now());

    say(&mut session, &provider, "hello").await;
    let reply = &session.log().last().unwrap().content;
    let parts = segment(reply);
    assert_eq!(parts.len(), 2);
    assert!(parts[1].is_code());

    session.submit("!amber", Local::now());
    assert_eq!(session.theme(), Theme::Amber);
    assert_eq!(session.log().len(), 4 + 2 + 1);

    say(&mut session, &provider, "again").await;
    let seen = provider.seen.lock().unwrap().last().unwrap().clone();
    // system + hello + reply + again; command output never goes upstream
    assert_eq!(seen.len(), 4);

    session.submit("!clear", Local::now());
    assert_eq!(session.log().len(), 1);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn persona_switch_changes_system_prompt() {
    let provider = EchoProvider { seen: Mutex::new(Vec::new()) };
    let mut session = ChatSession::new();
    say(&mut session, &provider, "before").await;

    session.submit("!cortana", Local::now());
    say(&mut session, &provider, "after").await;

    let seen = provider.seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(last[0].content, CORTANA.system_prompt);
    assert_eq!(last.len(), 2);
}

#[test]
fn preferences_survive_reload_except_pinned_persona() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("prefs.toml");

    let mut session = ChatSession::new();
    session.submit("!amber", Local::now());
    session.preferences().save_to_path(&path).unwrap();

    let mut reloaded = ChatSession::new();
    reloaded.restore(&Preferences::load_from_path(&path).unwrap());
    assert_eq!(reloaded.theme(), Theme::Amber);
    assert_eq!(reloaded.persona().id, PersonaId::Nytemode);

    session.submit("!cortana", Local::now());
    session.preferences().save_to_path(&path).unwrap();
    let mut reloaded = ChatSession::new();
    reloaded.restore(&Preferences::load_from_path(&path).unwrap());
    assert_eq!(reloaded.persona().id, PersonaId::Nytemode);
    assert_eq!(reloaded.theme(), Theme::Green);
}
