//! Command router for `!`-prefixed input.
//!
//! Routing is a pure function of one trimmed input line plus the current persona, theme,
//! connection status and clock. The caller applies the returned [`CommandResult`] to its
//! own state; nothing here performs I/O.

use crate::persona::{Persona, PersonaId, Theme};
use crate::session::ConnectionStatus;
use chrono::{DateTime, Local};

pub const COMMAND_MARKER: char = '!';

const BIO: &str = "nytemode: Creator, developer, and designer who does the best work in the late hours, \
when the world sleeps and focus peaks. Background in gaming, with projects spanning web development, \
e-commerce, AI and blockchain, built where technical precision meets creative expression. \
Explore the digital museum at [nytemode.com](https://nytemode.com) — \"NOCTURNAL BY PREFERENCE.\"";

const PINNED_THEME_REFUSAL: &str =
    "I'm Cortana. My interface remains blue. You'll need to exit Cortana mode to change terminal colors.";

/// Closed set of recognized command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Info,
    Clear,
    Time,
    Status,
    /// `!nytemode`: author bio.
    Bio,
    SwitchPersona(PersonaId),
    SwitchTheme(Theme),
    /// `!glados` / `!stillalive`: suspend the chat view until closed.
    StillAlive,
}

impl Command {
    /// Exact, case-sensitive match on the name without the marker.
    pub fn parse(name: &str) -> Option<Self> {
        let cmd = match name {
            "help" => Command::Help,
            "info" => Command::Info,
            "clear" => Command::Clear,
            "time" => Command::Time,
            "status" => Command::Status,
            "nytemode" => Command::Bio,
            "nyte" => Command::SwitchPersona(PersonaId::Nytemode),
            "cortana" => Command::SwitchPersona(PersonaId::Cortana),
            "green" => Command::SwitchTheme(Theme::Green),
            "amber" => Command::SwitchTheme(Theme::Amber),
            "blue" => Command::SwitchTheme(Theme::Blue),
            "glados" | "stillalive" => Command::StillAlive,
            _ => return None,
        };
        Some(cmd)
    }
}

/// Audio cue for the UI; playback itself is outside the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Soundtrack {
    Start,
    Stop,
}

/// State transition requested by a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateChange {
    pub persona: Option<PersonaId>,
    pub theme: Option<Theme>,
    /// When true, `messages` replace the log; otherwise they are appended.
    pub clear_history: bool,
    pub messages: Vec<String>,
    pub soundtrack: Option<Soundtrack>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Informational reply, no state mutation.
    Reply(String),
    StateChange(StateChange),
    /// Enter the immersive presentation.
    Immersive,
    /// Marker-prefixed but not a command; carries the help-pointer reply.
    Unrecognized(String),
    /// Not a command; submit upstream as-is.
    PassThrough(String),
}

/// Everything the router reads besides the input line.
#[derive(Debug, Clone, Copy)]
pub struct RouteContext {
    pub persona: PersonaId,
    pub theme: Theme,
    pub connection: ConnectionStatus,
    pub now: DateTime<Local>,
}

pub fn route(input: &str, ctx: &RouteContext) -> CommandResult {
    let Some(name) = input.strip_prefix(COMMAND_MARKER) else {
        return CommandResult::PassThrough(input.to_string());
    };
    let Some(command) = Command::parse(name) else {
        return CommandResult::Unrecognized(unrecognized_reply(input));
    };
    let persona = Persona::get(ctx.persona);

    match command {
        Command::Help => CommandResult::Reply(help_text(persona)),
        Command::Info => CommandResult::Reply(info_text()),
        Command::Bio => CommandResult::Reply(BIO.to_string()),
        Command::Time => CommandResult::Reply(format!(
            "Current system time: {}",
            ctx.now.format("%A, %B %-d, %Y at %-I:%M:%S %p")
        )),
        Command::Status => CommandResult::Reply(format!(
            "Connection status: {}\nSystem status: OPERATIONAL\nPersona: {}\nTheme: {}",
            ctx.connection, persona.display_name, ctx.theme
        )),
        Command::Clear => CommandResult::StateChange(StateChange {
            clear_history: true,
            messages: vec!["Chat history cleared.".to_string()],
            ..Default::default()
        }),
        Command::SwitchPersona(id) => CommandResult::StateChange(switch_persona(id)),
        // `!blue` parses as a theme but is never activatable from the keyboard.
        Command::SwitchTheme(theme) if !theme.is_user_selectable() => {
            CommandResult::Unrecognized(unrecognized_reply(input))
        }
        Command::SwitchTheme(_) if persona.pins_theme => {
            CommandResult::Reply(PINNED_THEME_REFUSAL.to_string())
        }
        Command::SwitchTheme(theme) => CommandResult::StateChange(StateChange {
            theme: Some(theme),
            messages: vec![format!("Switched to {} terminal theme.", theme)],
            ..Default::default()
        }),
        Command::StillAlive => CommandResult::Immersive,
    }
}

fn switch_persona(id: PersonaId) -> StateChange {
    let target = Persona::get(id);
    let mut messages = vec![format!("Switched to {} persona.", confirmation_name(id))];
    if let Some(greeting) = target.greeting {
        messages.push(greeting.to_string());
    }
    StateChange {
        persona: Some(id),
        theme: Some(target.theme),
        clear_history: true,
        messages,
        soundtrack: Some(if target.pins_theme {
            Soundtrack::Start
        } else {
            Soundtrack::Stop
        }),
    }
}

fn confirmation_name(id: PersonaId) -> &'static str {
    match id {
        PersonaId::Nytemode => "nytemode",
        PersonaId::Cortana => "Cortana",
    }
}

fn unrecognized_reply(input: &str) -> String {
    format!(
        "Command not recognized: {}\nType {}help to see available commands.",
        input, COMMAND_MARKER
    )
}

fn info_text() -> String {
    format!(
        "nytechat v{}\nA retro terminal-style chat interface for conversing with AI.\n\
         Built with Rust, axum, and tokio.\n© 2025 ❤️ [nytemode.com](https://nytemode.com)",
        crate::version()
    )
}

fn help_text(persona: &Persona) -> String {
    let mut rows: Vec<(&str, &str)> = vec![
        ("!help", "Show this help message"),
        ("!info", "Show information about NyteChat"),
        ("!clear", "Clear the chat history"),
        ("!time", "Display current system time"),
        ("!status", "Show connection status"),
    ];
    if !persona.pins_theme {
        rows.push(("!green", "Switch to green terminal theme"));
        rows.push(("!amber", "Switch to amber terminal theme"));
    }
    rows.push(("!stillalive", "Activate GLaDOS mode"));

    let mut out = String::from("```\nCOMMAND        DESCRIPTION\n-------        -----------\n");
    for (name, desc) in rows {
        out.push_str(&format!("{:<15}{}\n", name, desc));
    }
    out.push_str("```");
    out
}
