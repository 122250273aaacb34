//! Free-text sanitizer applied to every keystroke before it reaches form state.
//!
//! Malformed input is cleaned, never rejected. The cleaning passes are applied
//! until the text stops changing, so `sanitize(sanitize(x)) == sanitize(x)` and
//! removals cannot splice together a new dangerous token.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

/// How whitespace is treated after dangerous content is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SanitizeMode {
    /// Single-line text: line breaks become spaces.
    Text,
    /// Names and titles: whitespace runs collapse to one space, no leading space.
    Name,
    /// Paragraphs and bullet lists: line breaks are kept, `\r\n` becomes `\n`.
    Multiline,
}

struct Patterns {
    control: Regex,
    script_block: Regex,
    script_tag: Regex,
    embed_tag: Regex,
    any_tag: Regex,
    unclosed_tag: Regex,
    script_uri: Regex,
    data_html: Regex,
    whitespace_run: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("sanitizer pattern must compile");
        Patterns {
            control: re(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]"),
            script_block: re(r"(?is)<\s*script\b.*?<\s*/\s*script\s*>"),
            script_tag: re(r"(?i)<\s*/?\s*script[^>]*>?"),
            embed_tag: re(r"(?i)<\s*/?\s*(iframe|object|embed|style|link|meta|base|frame|frameset)\b[^>]*>?"),
            any_tag: re(r"</?[a-zA-Z!][^<>]*>"),
            unclosed_tag: re(r"</?[a-zA-Z!][^<>]*$"),
            script_uri: re(r"(?i)(java|vb)\s*script\s*:"),
            data_html: re(r#"(?i)data\s*:\s*text/html[^\s"'<>]*"#),
            whitespace_run: re(r"\s+"),
        }
    })
}

/// Cleans `raw` for storage. Total and side-effect free. All markup is
/// removed; resume fields are plain text.
pub fn sanitize(raw: &str, mode: SanitizeMode) -> String {
    let mut current = raw.to_string();
    loop {
        let next = sanitize_pass(&current, mode);
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Sanitizes a JSON input. Anything that is not a string yields an empty string.
pub fn sanitize_value(value: &Value, mode: SanitizeMode) -> String {
    match value {
        Value::String(s) => sanitize(s, mode),
        _ => String::new(),
    }
}

fn sanitize_pass(input: &str, mode: SanitizeMode) -> String {
    let p = patterns();
    let s = p.control.replace_all(input, "");
    let s = p.script_block.replace_all(&s, "");
    let s = p.script_tag.replace_all(&s, "");
    let s = p.embed_tag.replace_all(&s, "");
    // Fields are plain text: any remaining markup goes, attributes and all.
    let s = p.any_tag.replace_all(&s, "");
    let s = p.unclosed_tag.replace_all(&s, "");
    let s = p.script_uri.replace_all(&s, "");
    let s = p.data_html.replace_all(&s, "");

    match mode {
        SanitizeMode::Name => p.whitespace_run.replace_all(&s, " ").trim_start().to_string(),
        SanitizeMode::Text => s.replace("\r\n", " ").replace(&['\r', '\n'][..], " "),
        SanitizeMode::Multiline => s.replace("\r\n", "\n").replace('\r', "\n"),
    }
}
