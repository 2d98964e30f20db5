// src/render/format.rs
//! Turn extracted content into a Telegram HTML message.
//!
//! Steps:
//! 1. escape stray markup, then link `[n]` markers to `sources[n-1]`;
//! 2. if the reply arrived as one long line, rebuild paragraphs (best effort, see below);
//! 3. bold the title line and the commentary header;
//! 4. rewrite the obsolete commentary header to the current one.
//!
//! Paragraph rebuilding is a heuristic, not a sentence parser: it breaks after `". "` followed
//! by an uppercase Cyrillic letter, so abbreviations such as `ст. Закона` get split as well.
//!
//! Running the formatter on its own output is a no-op for multi-line input: linked markers are
//! not linked again and lines already starting with a tag are left alone.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::markup::{anchor, bold, char_len, escape_text, is_balanced};
use crate::parse::{
    ExtractedContent, CANONICAL_COMMENT_HEADER, COMMENT_GLYPH, COMMENT_SECTION,
    OBSOLETE_COMMENT_HEADER, SOURCES_HEADER, TITLE_GLYPH,
};

/// Flattened replies longer than this get their paragraphs rebuilt.
pub const FLAT_TEXT_THRESHOLD: usize = 200;

/// Header phrases that should be followed by a paragraph break.
const BREAK_AFTER: [&str; 2] = ["КОНСУЛЬТАНТА:", "ЮРИСТА:"];

static MARKER_OR_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<a href="[^"]*">\[[0-9]+\]</a>|\[([0-9]+)\]"#).unwrap());
static SENTENCE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\. ([А-ЯЁ])").unwrap());
static MARKER_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\[[0-9]+\](?:</a>)?)\s*([А-ЯЁ])").unwrap());

pub fn format_message(content: &ExtractedContent) -> String {
    let escaped = escape_text(&content.body);
    let mut text = link_markers(&escaped, &content.sources);

    if !text.contains('\n') && char_len(&text) > FLAT_TEXT_THRESHOLD {
        debug!(target: "format", len = char_len(&text), "rebuilding paragraphs of flat reply");
        text = rebuild_paragraphs(&text);
    }

    let mut lines: Vec<String> = Vec::new();
    for line in text.split('\n') {
        let t = line.trim();
        if t.is_empty() {
            lines.push(String::new());
        } else if t.starts_with(TITLE_GLYPH) {
            lines.push(bold(t));
        } else if t.starts_with(COMMENT_GLYPH) {
            match split_header(t) {
                Some((head, rest)) => {
                    lines.push(bold(&format!("{head}:")));
                    let rest = rest.trim();
                    if !rest.is_empty() {
                        lines.push(rest.to_string());
                    }
                }
                None => lines.push(bold(t)),
            }
        } else {
            lines.push(t.to_string());
        }
    }

    lines
        .join("\n")
        .replace(OBSOLETE_COMMENT_HEADER, CANONICAL_COMMENT_HEADER)
}

/// Split a commentary line at its first `:` that is outside markup, e.g. not the one in `https:`
/// of an already linked marker. A header that would cut through an element is not split.
fn split_header(line: &str) -> Option<(&str, &str)> {
    let mut in_tag = false;
    let idx = line.char_indices().find_map(|(i, c)| {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            ':' if !in_tag => return Some(i),
            _ => {}
        }
        None
    })?;
    let head = &line[..idx];
    is_balanced(head).then(|| (head, &line[idx + 1..]))
}

/// Wrap each bare `[n]` with a link to `sources[n-1]`; already linked or unmatched markers stay.
fn link_markers(text: &str, sources: &[String]) -> String {
    let mut linked = 0usize;
    let out = MARKER_OR_LINK.replace_all(text, |caps: &regex::Captures<'_>| {
        let whole = &caps[0];
        let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            return whole.to_string();
        };
        match n.checked_sub(1).and_then(|i| sources.get(i)) {
            Some(url) if !url.is_empty() => {
                linked += 1;
                anchor(url, whole)
            }
            _ => whole.to_string(),
        }
    });
    trace!(target: "format", linked, sources = sources.len(), "linked citation markers");
    out.into_owned()
}

fn rebuild_paragraphs(text: &str) -> String {
    let mut out = text
        .replace(COMMENT_SECTION, &format!("\n\n{COMMENT_SECTION}"))
        .replace(SOURCES_HEADER, &format!("\n\n{SOURCES_HEADER}"));
    for header in BREAK_AFTER {
        out = out.replace(header, &format!("{header}\n\n"));
    }
    out = SENTENCE_BREAK.replace_all(&out, ".\n\n$1").into_owned();
    out = MARKER_BREAK.replace_all(&out, "$1\n\n$2").into_owned();
    out.split('\n').map(str::trim).collect::<Vec<_>>().join("\n")
}
