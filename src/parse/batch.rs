// src/parse/batch.rs
//! Batch replies: one research answer listing up to seven ranked items.
//!
//! Each item starts with `ПРИОРИТЕТ `, carries a `📜` title line, a body, and an optional
//! `ИСТОЧНИКИ:` block of `🔗` bullets.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sources::ExtractedContent;
use super::{
    trim_url, CANONICAL_COMMENT_HEADER, PRIORITY_DELIMITER, SOURCES_HEADER, SOURCE_GLYPH,
    TITLE_GLYPH,
};

pub const MIN_PRIORITY: u8 = 1;
pub const MAX_PRIORITY: u8 = 7;

/// Most specific phrases first, so `ОЧЕНЬ ВАЖНО` is never read as plain `ВАЖНО`.
const PRIORITY_KEYWORDS: [(&str, u8); 7] = [
    ("КРИТИЧЕСКИ ВАЖНО", 1),
    ("ОЧЕНЬ ВАЖНО", 2),
    ("ВАЖНО", 3),
    ("СРЕДНЯЯ", 4),
    ("УМЕРЕННАЯ", 5),
    ("ДОПОЛНИТЕЛЬНАЯ", 6),
    ("НИЗКАЯ", 7),
];

static ITEM_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s\)]+").unwrap());
static BOLD_COMMENT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*КОММЕНТАРИЙ КАРМАННОГО КОНСУЛЬТАНТА:\*\*").unwrap());
static EMPHASIS_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*[А-Я][а-я]+:\*\s*").unwrap());
static LEADING_STARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\*\*\s*").unwrap());
static TRAILING_STARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*\s*$").unwrap());
static EXTRA_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    /// 1 = most important.
    pub priority: u8,
    pub title: String,
    pub body: String,
    pub sources: Vec<String>,
}

impl NewsItem {
    /// Content ready for the formatter: cleaned body with the title line on top.
    pub fn to_content(&self) -> ExtractedContent {
        let cleaned = clean_research_formatting(&self.body);
        let body = if cleaned.contains(TITLE_GLYPH) {
            cleaned
        } else if self.title.starts_with(TITLE_GLYPH) {
            format!("{}\n\n{cleaned}", self.title)
        } else {
            format!("{TITLE_GLYPH} {}\n\n{cleaned}", self.title)
        };
        ExtractedContent::new(body, self.sources.clone())
    }
}

/// Parse a batch reply into items sorted by priority (stable).
pub fn parse_batch(raw: &str) -> Vec<NewsItem> {
    let mut items: Vec<NewsItem> = raw
        .split(PRIORITY_DELIMITER)
        .enumerate()
        .skip(1)
        .filter_map(|(ordinal, segment)| parse_segment(ordinal, segment))
        .collect();
    items.sort_by_key(|it| it.priority);
    debug!(target: "batch", items = items.len(), "parsed batch reply");
    items
}

fn parse_segment(ordinal: usize, segment: &str) -> Option<NewsItem> {
    let header = segment.split('\n').next().unwrap_or_default();
    let priority = detect_priority(header).unwrap_or_else(|| ordinal_priority(ordinal));

    let (content_part, sources_part) = segment
        .split_once(SOURCES_HEADER)
        .unwrap_or((segment, ""));

    let lines: Vec<&str> = content_part.split('\n').collect();
    let (title, body) = match lines.iter().position(|l| l.contains(TITLE_GLYPH)) {
        Some(idx) => (
            lines[idx].replace(TITLE_GLYPH, "").trim().to_string(),
            lines[idx + 1..].join("\n").trim().to_string(),
        ),
        None => (String::new(), String::new()),
    };

    if title.is_empty() || body.is_empty() {
        debug!(target: "batch", ordinal, "dropping segment without title or body");
        return None;
    }

    let sources = sources_part
        .split('\n')
        .filter(|l| l.contains(SOURCE_GLYPH) && l.contains("http"))
        .filter_map(|l| ITEM_URL.find(l))
        .map(|m| trim_url(m.as_str(), &[')']))
        .collect();

    Some(NewsItem {
        priority,
        title,
        body,
        sources,
    })
}

fn detect_priority(header: &str) -> Option<u8> {
    PRIORITY_KEYWORDS
        .iter()
        .find(|(kw, _)| header.contains(kw))
        .map(|(_, p)| *p)
}

fn ordinal_priority(ordinal: usize) -> u8 {
    ordinal.clamp(MIN_PRIORITY as usize, MAX_PRIORITY as usize) as u8
}

/// Remove markdown left over by deep-research replies.
pub fn clean_research_formatting(content: &str) -> String {
    let mut out = BOLD_COMMENT_HEADER
        .replace_all(content, CANONICAL_COMMENT_HEADER)
        .into_owned();
    out = EMPHASIS_LABEL.replace_all(&out, "").into_owned();
    out = TRAILING_STARS.replace(&out, "").into_owned();
    out = LEADING_STARS.replace(&out, "").into_owned();
    while EXTRA_BLANKS.is_match(&out) {
        out = EXTRA_BLANKS.replace_all(&out, "\n\n").into_owned();
    }
    out.split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
