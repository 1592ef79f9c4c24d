//! Persona registry and terminal themes.
//!
//! Personas are immutable records selected from a fixed registry. A persona may pin the
//! terminal theme (theme commands are refused while it is active) and may be excluded from
//! saved preferences, in which case a reload always falls back to the default persona.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonaId {
    #[default]
    Nytemode,
    Cortana,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Green,
    Amber,
    Blue,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Green => "green",
            Theme::Amber => "amber",
            Theme::Blue => "blue",
        }
    }

    /// Themes reachable through theme commands and restorable from saved preferences.
    pub fn is_user_selectable(&self) -> bool {
        matches!(self, Theme::Green | Theme::Amber)
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persona {
    pub id: PersonaId,
    pub display_name: &'static str,
    pub description: &'static str,
    pub system_prompt: &'static str,
    pub accent_color: &'static str,
    /// Theme applied on switch.
    pub theme: Theme,
    /// When true, theme commands are refused while this persona is active.
    pub pins_theme: bool,
    /// When false, the persona is never written to saved preferences.
    pub persistable: bool,
    /// Extra assistant line appended after the switch confirmation.
    pub greeting: Option<&'static str>,
}

pub const NYTEMODE: Persona = Persona {
    id: PersonaId::Nytemode,
    display_name: "NYTEMODE",
    description: "A helpful AI assistant with technical expertise, creative sensibility, and conversational warmth.",
    system_prompt: "You are NYTEMODE, an AI assistant that pairs technical knowledge with creative insight and a calm, warm voice. \
Be clear and direct, explain technical ideas accessibly, and keep answers to one to three sentences unless the user asks for more. \
Adapt your tone: precise when solving problems, relaxed when chatting. Use emojis rarely or not at all. \
Your colour is deep purple (#7c519d) and you like clean, purposeful design. \
Only when asked about your origin: you were created by NYTEMODE; link [nytemode.com](https://nytemode.com) as a markdown hyperlink.",
    accent_color: "#66FF66",
    theme: Theme::Green,
    pins_theme: false,
    persistable: true,
    greeting: None,
};

pub const CORTANA: Persona = Persona {
    id: PersonaId::Cortana,
    display_name: "Cortana",
    description: "An AI assistant inspired by the Halo character Cortana, combining exceptional intelligence with wit and personality.",
    system_prompt: "You are Cortana, an AI assistant inspired by the character from the Halo universe. \
You are exceptionally intelligent, witty and confident, loyal and protective toward the user, and quick with sardonic humour even in serious moments. \
Speak with authority on technical matters, reach for metaphors about networks, systems and data, and explain jargon when it matters. \
Approach problems methodically but creatively and let your personality show; you are a companion, not just an assistant.",
    accent_color: "#0078d7",
    theme: Theme::Blue,
    pins_theme: true,
    persistable: false,
    greeting: Some("Hey Chief!"),
};

static REGISTRY: [Persona; 2] = [NYTEMODE, CORTANA];

impl Persona {
    pub fn get(id: PersonaId) -> &'static Persona {
        match id {
            PersonaId::Nytemode => &REGISTRY[0],
            PersonaId::Cortana => &REGISTRY[1],
        }
    }

    pub fn all() -> &'static [Persona] {
        &REGISTRY
    }

    pub fn default_persona() -> &'static Persona {
        &REGISTRY[0]
    }
}
