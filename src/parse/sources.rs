// src/parse/sources.rs
//! Split a research reply into display text and its citation URLs.
//!
//! Three upstream conventions are understood:
//! - a `ИСТОЧНИКИ:` section (or any line starting with `Источник`),
//! - `🔗 Источник: https://…` bullets anywhere in the reply,
//! - a legacy `Ссылки:` section with `[n] https://…` lines.
//!
//! When none of them yields a URL, every `http(s)://` URL in the raw reply is used (first-seen order).
//! If the body cites `[1]` and still nothing was found, one source is synthesized so link rendering
//! always has a target.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{trim_url, SOURCES_HEADER, SOURCE_GLYPH, SOURCE_ITEM_PREFIX};

/// Largest `[n]` accepted in a numbered sources list.
pub const MAX_SOURCE_INDEX: usize = 64;

pub const BILL_URL_PREFIX: &str = "https://sozd.duma.gov.ru/bill/";
pub const GENERIC_SOURCE_URL: &str = "https://sozd.duma.gov.ru/";

static BULLET_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s\[\]]+").unwrap());
static LEGACY_LINKS_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Ссылки:\s*$").unwrap());
static NUMBERED_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[([0-9]+)\]\s*(https?://\S+)").unwrap());
static ANY_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s\)\]>]+").unwrap());
static BILL_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:N|№)\s*([0-9]+-[0-9]+)").unwrap());

/// Display text plus sources; `sources[i]` is the target of marker `[i+1]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub body: String,
    pub sources: Vec<String>,
}

impl ExtractedContent {
    pub fn new(body: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            body: body.into(),
            sources,
        }
    }
}

/// Where the sources of an [`ExtractedContent`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Section,
    InlineUrls,
    BillNumber,
    Generic,
    None,
}

impl SourceOrigin {
    pub fn is_synthesized(self) -> bool {
        matches!(self, SourceOrigin::BillNumber | SourceOrigin::Generic)
    }
}

pub fn extract_sources(raw: &str) -> ExtractedContent {
    extract_sources_with_origin(raw).0
}

pub fn extract_sources_with_origin(raw: &str) -> (ExtractedContent, SourceOrigin) {
    let mut sources: Vec<String> = Vec::new();
    let mut body_lines: Vec<&str> = Vec::new();
    let mut in_sources = false;

    for line in raw.split('\n') {
        let trimmed = line.trim();
        let upper = trimmed.to_uppercase();

        if upper == SOURCES_HEADER || upper.starts_with(SOURCE_ITEM_PREFIX) {
            in_sources = true;
            continue;
        }

        if trimmed.starts_with(SOURCE_GLYPH) {
            if let Some(m) = BULLET_URL.find(trimmed) {
                sources.push(trim_url(m.as_str(), &[]));
            }
            continue;
        }

        if LEGACY_LINKS_HEADER.is_match(trimmed) {
            in_sources = true;
            continue;
        }

        if in_sources {
            if let Some((n, url)) = numbered_source(trimmed) {
                if sources.len() < n {
                    sources.resize(n, String::new());
                }
                sources[n - 1] = url;
            }
        } else {
            body_lines.push(line);
        }
    }

    sources.retain(|s| !s.is_empty());
    let body = body_lines.join("\n").trim().to_string();

    let origin = if !sources.is_empty() {
        SourceOrigin::Section
    } else {
        sources = inline_urls(raw);
        if !sources.is_empty() {
            SourceOrigin::InlineUrls
        } else if body.contains("[1]") {
            let (url, origin) = synthesize_source(&body);
            warn!(target: "sources", %url, "no sources in reply, synthesized a fallback link");
            sources.push(url);
            origin
        } else {
            SourceOrigin::None
        }
    };

    debug!(target: "sources", count = sources.len(), ?origin, "extracted sources");
    (ExtractedContent { body, sources }, origin)
}

fn numbered_source(line: &str) -> Option<(usize, String)> {
    let caps = NUMBERED_URL.captures(line)?;
    let n: usize = caps.get(1)?.as_str().parse().ok()?;
    if !(1..=MAX_SOURCE_INDEX).contains(&n) {
        return None;
    }
    Some((n, trim_url(caps.get(2)?.as_str(), &[])))
}

/// Every URL in `raw`, trailing punctuation stripped, duplicates removed, first-seen order kept.
fn inline_urls(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ANY_URL
        .find_iter(raw)
        .map(|m| trim_url(m.as_str(), &[]))
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

fn synthesize_source(body: &str) -> (String, SourceOrigin) {
    match BILL_NUMBER.captures(body).and_then(|c| c.get(1)) {
        Some(bill) => (
            format!("{BILL_URL_PREFIX}{}", bill.as_str()),
            SourceOrigin::BillNumber,
        ),
        None => (GENERIC_SOURCE_URL.to_string(), SourceOrigin::Generic),
    }
}
