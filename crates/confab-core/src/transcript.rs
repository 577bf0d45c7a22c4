//! Title and session-type extraction from an uploaded JSONL transcript.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::sanitize::truncate_for_log;
use crate::upload::ValidatedFile;

pub const DEFAULT_SESSION_TYPE: &str = "Claude Code";
const FALLBACK_TITLE_BYTES: usize = 100;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranscriptMetadata {
    pub title: Option<String>,
    pub session_type: String,
}

/// Scan the first file typed `transcript`. A `summary` entry gives the
/// title; otherwise the first user message, cut to 100 bytes of plain text
/// before escaping. Lines that are
/// not JSON are skipped.
pub fn extract_metadata(files: &[ValidatedFile]) -> TranscriptMetadata {
    let content = files
        .iter()
        .find(|f| f.file_type == "transcript")
        .map(|f| f.content.as_slice())
        .unwrap_or_default();

    let mut title: Option<String> = None;
    let mut first_user: Option<String> = None;

    for line in String::from_utf8_lossy(content).lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(entry) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        match entry.get("type").and_then(Value::as_str) {
            Some("summary") if title.is_none() => {
                if let Some(summary) = entry.get("summary").and_then(Value::as_str) {
                    let cleaned = sanitize_title(summary);
                    if !cleaned.is_empty() {
                        title = Some(cleaned);
                    }
                }
            }
            Some("user") if first_user.is_none() => {
                let content = entry
                    .get("message")
                    .and_then(|m| m.get("content"))
                    .and_then(Value::as_str);
                if let Some(text) = content.filter(|t| !t.is_empty()) {
                    // Cut the plain text so an escape sequence is never split.
                    let plain = plain_text(text);
                    let cut = truncate_for_log(plain.trim(), FALLBACK_TITLE_BYTES);
                    first_user = Some(escape_html(cut).trim().to_owned());
                }
            }
            _ => {}
        }

        if title.is_some() {
            break;
        }
    }

    TranscriptMetadata {
        title: title.or(first_user).filter(|t| !t.is_empty()),
        session_type: DEFAULT_SESSION_TYPE.to_owned(),
    }
}

/// Strip markup, normalise entities, then escape for HTML display.
pub fn sanitize_title(input: &str) -> String {
    escape_html(&plain_text(input)).trim().to_owned()
}

fn plain_text(input: &str) -> String {
    unescape_html(&HTML_TAG.replace_all(input, ""))
}

fn unescape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match tail.find(';').filter(|end| *end <= 10) {
            Some(end) => match decode_entity(&tail[1..end]) {
                Some(c) => {
                    out.push(c);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "lt" => Some('<'),
        "gt" => Some('>'),
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(lines: &[&str]) -> Vec<ValidatedFile> {
        vec![ValidatedFile {
            path: "t.jsonl".into(),
            file_type: "transcript".into(),
            content: lines.join("\n").into_bytes(),
        }]
    }

    #[test]
    fn summary_wins_over_user_message() {
        let files = transcript(&[
            r#"{"type":"user","message":{"content":"please fix the build"}}"#,
            r#"{"type":"summary","summary":"Build fix"}"#,
        ]);
        let meta = extract_metadata(&files);
        assert_eq!(meta.title.as_deref(), Some("Build fix"));
        assert_eq!(meta.session_type, "Claude Code");
    }

    #[test]
    fn falls_back_to_truncated_first_user_message() {
        let long = "x".repeat(150);
        let line = format!(r#"{{"type":"user","message":{{"content":"{long}"}}}}"#);
        let meta = extract_metadata(&transcript(&[&line]));
        assert_eq!(meta.title.map(|t| t.len()), Some(100));
    }

    #[test]
    fn fallback_title_never_ends_inside_an_entity() {
        let text = format!("{}&tail", "x".repeat(99));
        let line = format!(r#"{{"type":"user","message":{{"content":"{text}"}}}}"#);
        let title = extract_metadata(&transcript(&[&line])).title.unwrap();
        assert_eq!(title, format!("{}&amp;", "x".repeat(99)));
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let files = transcript(&["not json", "", r#"{"type":"summary","summary":"ok"}"#]);
        assert_eq!(extract_metadata(&files).title.as_deref(), Some("ok"));
    }

    #[test]
    fn no_transcript_means_no_title() {
        let files = vec![ValidatedFile {
            path: "agent.jsonl".into(),
            file_type: "agent".into(),
            content: br#"{"type":"summary","summary":"ignored"}"#.to_vec(),
        }];
        let meta = extract_metadata(&files);
        assert!(meta.title.is_none());
        assert_eq!(meta.session_type, DEFAULT_SESSION_TYPE);
    }

    #[test]
    fn title_markup_is_neutralised() {
        assert_eq!(sanitize_title("<b>bold</b> move"), "bold move");
        assert_eq!(sanitize_title("&lt;script&gt;"), "&lt;script&gt;");
        assert_eq!(sanitize_title("  a & b  "), "a &amp; b");
        assert_eq!(sanitize_title("it&#39;s"), "it&#39;s");
    }
}
