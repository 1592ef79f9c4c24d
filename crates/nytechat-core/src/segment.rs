//! Splits message bodies into prose and fenced code for rendering, and rewrites
//! markdown links in prose.
//!
//! A fence is a pair of triple backticks; an ASCII word directly after the opening fence
//! and followed by a newline is taken as the language hint. An opening fence without a
//! closing one is left as prose.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:([A-Za-z0-9_]+)\n)?(.*?)```").expect("fence pattern"));

static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind<'a> {
    Text,
    Code { language: Option<&'a str> },
}

/// One slice of the input. `raw` is the exact source span (fences included), so the
/// raw parts of all segments concatenate back to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub kind: SegmentKind<'a>,
    /// Displayable body: prose as-is, or code without fences and language line.
    pub content: &'a str,
    pub raw: &'a str,
    pub span: Range<usize>,
}

impl Segment<'_> {
    pub fn is_code(&self) -> bool {
        matches!(self.kind, SegmentKind::Code { .. })
    }
}

pub fn segment(input: &str) -> Vec<Segment<'_>> {
    let mut parts = Vec::new();
    let mut last = 0;

    for caps in FENCE.captures_iter(input) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            parts.push(text(input, last..whole.start()));
        }
        let body = caps.get(2).map_or("", |m| m.as_str());
        parts.push(Segment {
            kind: SegmentKind::Code {
                language: caps.get(1).map(|m| m.as_str()),
            },
            content: body,
            raw: whole.as_str(),
            span: whole.range(),
        });
        last = whole.end();
    }

    if last < input.len() || parts.is_empty() {
        parts.push(text(input, last..input.len()));
    }
    parts
}

fn text(input: &str, span: Range<usize>) -> Segment<'_> {
    let slice = &input[span.clone()];
    Segment {
        kind: SegmentKind::Text,
        content: slice,
        raw: slice,
        span,
    }
}

/// Replaces each `[label](url)` with `render(label, url)`.
pub fn rewrite_links<F>(text: &str, render: F) -> String
where
    F: Fn(&str, &str) -> String,
{
    LINK.replace_all(text, |caps: &Captures| render(&caps[1], &caps[2]))
        .into_owned()
}

/// Prose to HTML with clickable links. Everything is escaped; `javascript:` targets are
/// rendered as plain text.
pub fn render_links_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in LINK.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&html_escape(&text[last..whole.start()]));
        let label = html_escape(&caps[1]);
        let url = caps[2].trim();
        if url.to_ascii_lowercase().starts_with("javascript:") {
            out.push_str(&label);
        } else {
            out.push_str(&format!(
                r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                html_escape(url),
                label
            ));
        }
        last = whole.end();
    }
    out.push_str(&html_escape(&text[last..]));
    out
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
