// src/render/markup.rs
//! The Telegram HTML subset we emit: `<b>…</b>` and `<a href="…">…</a>`.
//!
//! Everything else that looks like markup is escaped. Escaping is idempotent: allowed tags are
//! kept verbatim and text between them is entity-decoded before being encoded again.

use once_cell::sync::Lazy;
use regex::Regex;

static ALLOWED_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"</?b>|<a href="[^"<>]*">|</a>"#).unwrap());
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").unwrap());

pub fn bold(text: &str) -> String {
    format!("<b>{text}</b>")
}

pub fn anchor(url: &str, label: &str) -> String {
    format!(
        r#"<a href="{}">{label}</a>"#,
        html_escape::encode_double_quoted_attribute(url)
    )
}

/// Escape text for the HTML parse mode, leaving the allowed tags untouched.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for tag in ALLOWED_TAG.find_iter(text) {
        push_escaped(&mut out, &text[last..tag.start()]);
        out.push_str(tag.as_str());
        last = tag.end();
    }
    push_escaped(&mut out, &text[last..]);
    out
}

fn push_escaped(out: &mut String, segment: &str) {
    let decoded = html_escape::decode_html_entities(segment);
    out.push_str(&html_escape::encode_text(&decoded));
}

/// Remove every tag, keeping the inner text.
pub fn strip_tags(text: &str) -> String {
    ANY_TAG.replace_all(text, "").into_owned()
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// True when every `<b>`/`<a>` opened in `text` is also closed in it.
pub fn is_balanced(text: &str) -> bool {
    unclosed_start(text).is_none()
}

/// Byte offset of the earliest tag that is opened but never closed.
fn unclosed_start(text: &str) -> Option<usize> {
    let mut open: Vec<(bool, usize)> = Vec::new();
    for tag in ALLOWED_TAG.find_iter(text) {
        let t = tag.as_str();
        let is_bold = t == "<b>" || t == "</b>";
        if t.starts_with("</") {
            if let Some(pos) = open.iter().rposition(|(b, _)| *b == is_bold) {
                open.truncate(pos);
            }
        } else {
            open.push((is_bold, tag.start()));
        }
    }
    open.first().map(|(_, start)| *start)
}

/// Longest prefix of at most `max_chars` chars that neither splits a tag nor leaves one open.
pub fn safe_prefix(text: &str, max_chars: usize) -> String {
    let cut = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(i, _)| i);
    let mut prefix = &text[..cut];

    // inside a tag: back off to its `<`
    if let Some(lt) = prefix.rfind('<') {
        if prefix[lt..].find('>').is_none() {
            prefix = &prefix[..lt];
        }
    }

    if let Some(start) = unclosed_start(prefix) {
        if start > 0 {
            return prefix[..start].trim_end().to_string();
        }
        return strip_tags(prefix).trim_end().to_string();
    }
    prefix.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_keeps_allowed_tags() {
        let s = r#"<b>Заголовок</b> a < b & c <a href="https://x.ru">[1]</a> <i>no</i>"#;
        let e = escape_text(s);
        assert_eq!(
            e,
            r#"<b>Заголовок</b> a &lt; b &amp; c <a href="https://x.ru">[1]</a> &lt;i&gt;no&lt;/i&gt;"#
        );
    }

    #[test]
    fn escape_is_idempotent() {
        let s = "Tom & Jerry <3 &amp; <b>bold</b>";
        let once = escape_text(s);
        assert_eq!(escape_text(&once), once);
    }

    #[test]
    fn anchor_escapes_ampersand_in_href() {
        let a = anchor("https://x.ru/?a=1&b=2", "[1]");
        assert_eq!(a, r#"<a href="https://x.ru/?a=1&amp;b=2">[1]</a>"#);
        assert_eq!(escape_text(&a), a);
    }

    #[test]
    fn balance_detection() {
        assert!(is_balanced("<b>x</b> <a href=\"u\">y</a>"));
        assert!(!is_balanced("<b>x"));
        assert!(!is_balanced("text <a href=\"u\">y"));
    }

    #[test]
    fn prefix_never_cuts_inside_tag() {
        let s = r#"abc <a href="https://example.com">[1]</a>"#;
        assert_eq!(safe_prefix(s, 10), "abc");
        assert_eq!(safe_prefix(s, 100), s);
    }

    #[test]
    fn prefix_drops_unclosed_element() {
        let s = "Начало <b>жирный текст</b>";
        assert_eq!(safe_prefix(s, 15), "Начало");
    }

    #[test]
    fn prefix_strips_tags_when_element_opens_first() {
        let s = "<b>очень длинный заголовок</b>";
        assert_eq!(safe_prefix(s, 10), "очень д");
    }
}
