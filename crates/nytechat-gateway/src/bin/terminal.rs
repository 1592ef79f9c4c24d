//! nytechat terminal client. Talks to a running gateway over `/api/chat`.
//! Run with gateway up: cargo run --bin terminal
//!
//! NYTECHAT_URL (default http://127.0.0.1:3000) and NYTECHAT_PREFS (default
//! nytechat_prefs.toml) select the gateway and the preferences file. Ctrl-D exits.

use chrono::{Local, TimeZone};
use crossterm::{
    cursor, execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use nytechat_core::{
    rewrite_links, segment, ChatRequest, ChatResponse, ChatSession, CommandResult, ErrorResponse,
    Message, Preferences, Role, SegmentKind, Soundtrack, Submission, Theme,
};
use std::io::{self, stdout, Write};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEFAULT_URL: &str = "http://127.0.0.1:3000";

fn theme_color(theme: Theme) -> Color {
    match theme {
        Theme::Green => Color::Rgb { r: 0x66, g: 0xFF, b: 0x66 },
        Theme::Amber => Color::Rgb { r: 0xFF, g: 0xB0, b: 0x00 },
        Theme::Blue => Color::Rgb { r: 0x00, g: 0x78, b: 0xD7 },
    }
}

struct Screen {
    printed: usize,
}

impl Screen {
    fn clear(&mut self, out: &mut impl Write) -> io::Result<()> {
        execute!(out, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        self.printed = 0;
        Ok(())
    }

    /// Prints log entries not shown yet.
    fn flush(&mut self, out: &mut impl Write, session: &ChatSession) -> io::Result<()> {
        let log = session.log();
        if log.len() < self.printed {
            self.clear(out)?;
        }
        let color = theme_color(session.theme());
        for msg in &log[self.printed..] {
            print_message(out, msg, session.persona().display_name, color)?;
        }
        self.printed = log.len();
        out.flush()
    }
}

fn colored_line(out: &mut impl Write, color: Color, text: &str) -> io::Result<()> {
    queue!(out, SetForegroundColor(color), Print(text), ResetColor, Print("\n"))
}

fn dim_line(out: &mut impl Write, text: &str) -> io::Result<()> {
    queue!(
        out,
        SetAttribute(Attribute::Dim),
        Print(text),
        SetAttribute(Attribute::Reset),
        Print("\n")
    )
}

fn print_message(out: &mut impl Write, msg: &Message, persona: &str, color: Color) -> io::Result<()> {
    let stamp = Local
        .timestamp_millis_opt(msg.timestamp)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();
    let who = match msg.role {
        Role::User => "you",
        _ => persona,
    };
    colored_line(out, color, &format!("[{}] {}>", stamp, who))?;
    for part in segment(&msg.content) {
        match part.kind {
            SegmentKind::Text => {
                let text = rewrite_links(part.content, |label, url| format!("{} ({})", label, url));
                if !text.trim().is_empty() {
                    colored_line(out, color, text.trim_end())?;
                }
            }
            SegmentKind::Code { language } => {
                dim_line(out, &format!("--- {} ---", language.unwrap_or("code")))?;
                queue!(out, Print(part.content.trim_end()), Print("\n"))?;
                dim_line(out, "---")?;
            }
        }
    }
    Ok(())
}

async fn send(client: &reqwest::Client, base: &str, req: &ChatRequest) -> Result<String, String> {
    let res = client
        .post(format!("{}/api/chat", base))
        .json(req)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    let status = res.status();
    if status.is_success() {
        let body: ChatResponse = res.json().await.map_err(|e| e.to_string())?;
        return Ok(body.response);
    }
    let detail = res
        .json::<ErrorResponse>()
        .await
        .map(|e| e.error)
        .unwrap_or_else(|_| status.to_string());
    Err(format!("{}: {}", status, detail))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base = std::env::var("NYTECHAT_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let prefs_path = std::env::var("NYTECHAT_PREFS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| Preferences::default_path());

    let mut session = ChatSession::new();
    match Preferences::load_from_path(&prefs_path) {
        Ok(prefs) => session.restore(&prefs),
        Err(e) => eprintln!("[nytechat] preferences not loaded: {}", e),
    }
    session.boot(Local::now());

    let client = reqwest::Client::new();
    let mut out = stdout();
    let mut screen = Screen { printed: 0 };
    screen.flush(&mut out, &session)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if session.is_immersive() {
            session.close_immersive();
            dim_line(&mut out, "[ returning to terminal ]")?;
            out.flush()?;
            continue;
        }

        match session.submit(&line, Local::now()) {
            Submission::Ignored | Submission::Busy | Submission::TooLong => {}
            Submission::Command(CommandResult::Immersive) => {
                colored_line(
                    &mut out,
                    theme_color(session.theme()),
                    "[ immersive view: press ENTER to return ]",
                )?;
            }
            Submission::Command(CommandResult::StateChange(change)) => {
                if change.clear_history {
                    screen.clear(&mut out)?;
                }
                match change.soundtrack {
                    Some(Soundtrack::Start) => dim_line(&mut out, "[ soundtrack: playing ]")?,
                    Some(Soundtrack::Stop) => dim_line(&mut out, "[ soundtrack: stopped ]")?,
                    None => {}
                }
                if let Err(e) = session.preferences().save_to_path(&prefs_path) {
                    eprintln!("[nytechat] preferences not saved: {}", e);
                }
            }
            Submission::Command(_) => {}
            Submission::Send(req) => {
                screen.flush(&mut out, &session)?;
                dim_line(&mut out, &format!("[ {} ]", session.connection()))?;
                out.flush()?;
                let outcome = send(&client, &base, &req).await;
                session.complete(outcome, Local::now());
            }
        }
        screen.flush(&mut out, &session)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(session: &ChatSession) -> String {
        let mut out = Vec::new();
        Screen { printed: 0 }.flush(&mut out, session).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn themes_have_distinct_colors() {
        assert_ne!(theme_color(Theme::Green), theme_color(Theme::Amber));
        assert_ne!(theme_color(Theme::Amber), theme_color(Theme::Blue));
    }

    #[test]
    fn code_is_framed_and_links_are_inlined() {
        let msg = Message::assistant(
            "See [docs](https://nytemode.com)\n```rust\nfn main() {}\n```",
            0,
        );
        let mut out = Vec::new();
        print_message(&mut out, &msg, "NYTEMODE", theme_color(Theme::Green)).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("NYTEMODE>"));
        assert!(text.contains("See docs (https://nytemode.com)"));
        assert!(text.contains("--- rust ---"));
        assert!(text.contains("fn main() {}"));
        assert!(!text.contains("```"));
    }

    #[test]
    fn flush_prints_only_new_entries() {
        let mut session = ChatSession::new();
        session.boot(Local::now());
        let mut screen = Screen { printed: 0 };
        let mut out = Vec::new();
        screen.flush(&mut out, &session).unwrap();
        assert_eq!(screen.printed, session.log().len());

        let mut again = Vec::new();
        screen.flush(&mut again, &session).unwrap();
        assert!(again.is_empty());
        assert!(rendered(&session).contains("Initializing system..."));
    }

    #[test]
    fn cleared_log_is_redrawn_from_the_top() {
        let mut session = ChatSession::new();
        session.boot(Local::now());
        let mut screen = Screen { printed: 0 };
        screen.flush(&mut Vec::new(), &session).unwrap();

        session.submit("!clear", Local::now());
        let mut out = Vec::new();
        screen.flush(&mut out, &session).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Chat history cleared."));
        assert!(text.contains("\u{1b}[2J"));
        assert_eq!(screen.printed, 1);
    }
}
