// src/parse/mod.rs
//! Syntactic parsing of AI research replies.
//!
//! Everything here is total: a missing pattern yields an empty or `None` result, never an error.
//! The upstream generator has no schema, so the tokens below are the only contract we rely on.

pub mod batch;
pub mod dates;
pub mod freshness;
pub mod sources;

pub use batch::{parse_batch, NewsItem};
pub use dates::{extract_date, DateExtractor, YearPolicy};
pub use freshness::{
    classify, date_feedback, is_content_fresh, Freshness, FreshnessPolicy, ImplicitYear, Verdict,
};
pub use sources::{extract_sources, ExtractedContent, SourceOrigin};

/// Marks the document title line.
pub const TITLE_GLYPH: char = '📜';
/// Marks the commentary header line.
pub const COMMENT_GLYPH: char = '💬';
/// Marks a single source bullet.
pub const SOURCE_GLYPH: char = '🔗';

/// Header of the sources section.
pub const SOURCES_HEADER: &str = "ИСТОЧНИКИ:";
/// Any upper-cased line starting with this opens the sources section.
pub const SOURCE_ITEM_PREFIX: &str = "ИСТОЧНИК";
/// Precedes every ranked section of a batch reply.
pub const PRIORITY_DELIMITER: &str = "ПРИОРИТЕТ ";

/// Start of the commentary section inside flattened text.
pub const COMMENT_SECTION: &str = "💬 КОММЕНТАРИЙ";
/// Header phrase the channel uses today.
pub const CANONICAL_COMMENT_HEADER: &str = "КОММЕНТАРИЙ КАРМАННОГО КОНСУЛЬТАНТА:";
/// Header phrase older prompts produced; always rewritten to the canonical one.
pub const OBSOLETE_COMMENT_HEADER: &str = "КОММЕНТАРИЙ ЮРИСТА:";

/// Strip `.,;:` (and anything else in `extra`) from the end of a URL match.
pub(crate) fn trim_url(url: &str, extra: &[char]) -> String {
    url.trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':') || extra.contains(&c))
        .to_string()
}
