// src/render/chunk.rs
//! Split a formatted message into parts that fit the transport limit.
//!
//! Paragraphs (`\n\n`) are packed greedily. A paragraph that alone exceeds the limit is split into
//! sentences (`". "`), never inside a `<b>`/`<a>` element. A single sentence over the limit is
//! truncated with `...` as a last resort; at limits of 3 or less the ellipsis itself would not
//! fit, so the sentence is cut bare.
//!
//! Every returned chunk is at most `max_length` chars. Two degenerate inputs: a message that
//! already fits (the empty one included) comes back unchanged as the only element, and a
//! non-empty message with `max_length == 0` yields no chunks.

use super::markup::{char_len, is_balanced, safe_prefix};

pub const DEFAULT_MESSAGE_LIMIT: usize = 4000;

const PARAGRAPH_SEP: &str = "\n\n";
const SENTENCE_SEP: &str = ". ";
const ELLIPSIS: &str = "...";

pub fn chunk_message(message: &str, max_length: usize) -> Vec<String> {
    let max = max_length;
    if char_len(message) <= max {
        return vec![message.to_string()];
    }
    if max == 0 {
        return Vec::new();
    }

    let mut acc = Packer::new(max);
    for paragraph in message.split(PARAGRAPH_SEP) {
        if char_len(paragraph) <= max {
            acc.push(paragraph, PARAGRAPH_SEP);
            continue;
        }
        for sentence in split_sentences(paragraph) {
            if char_len(sentence) <= max {
                acc.push(sentence, "");
            } else {
                acc.flush();
                if let Some(cut) = truncate(sentence, max) {
                    acc.parts.push(cut);
                }
            }
        }
        acc.current.push_str(PARAGRAPH_SEP);
    }
    acc.finish()
}

/// Last-resort cut of one oversized sentence to at most `max` chars.
fn truncate(sentence: &str, max: usize) -> Option<String> {
    let cut = if max > ELLIPSIS.len() {
        format!("{}{ELLIPSIS}", safe_prefix(sentence, max - ELLIPSIS.len()))
    } else {
        safe_prefix(sentence, max)
    };
    (!cut.trim().is_empty()).then_some(cut)
}

struct Packer {
    max: usize,
    current: String,
    parts: Vec<String>,
}

impl Packer {
    fn new(max: usize) -> Self {
        Self {
            max,
            current: String::new(),
            parts: Vec::new(),
        }
    }

    fn push(&mut self, piece: &str, sep: &str) {
        let candidate = format!("{}{piece}", self.current);
        if char_len(candidate.trim()) > self.max {
            self.flush();
        }
        self.current.push_str(piece);
        self.current.push_str(sep);
    }

    fn flush(&mut self) {
        let part = self.current.trim();
        if !part.is_empty() {
            self.parts.push(part.to_string());
        }
        self.current.clear();
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.parts
    }
}

/// Sentence pieces with their `". "` kept, so joining them gives the paragraph back.
/// A boundary inside an open `<b>` or `<a>` element is skipped.
fn split_sentences(paragraph: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (idx, _) in paragraph.match_indices(SENTENCE_SEP) {
        let end = idx + SENTENCE_SEP.len();
        if is_balanced(&paragraph[start..end]) {
            out.push(&paragraph[start..end]);
            start = end;
        }
    }
    if start < paragraph.len() {
        out.push(&paragraph[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_single_chunk() {
        assert_eq!(chunk_message("abc", 4000), vec!["abc".to_string()]);
    }

    #[test]
    fn paragraphs_are_packed_greedily() {
        let msg = format!("{}\n\n{}\n\n{}", "a".repeat(30), "b".repeat(30), "c".repeat(30));
        let parts = chunk_message(&msg, 70);
        assert_eq!(
            parts,
            vec![
                format!("{}\n\n{}", "a".repeat(30), "b".repeat(30)),
                "c".repeat(30)
            ]
        );
    }

    #[test]
    fn long_paragraph_splits_on_sentences() {
        let para = "Первое предложение тут. Второе предложение тут. Третье предложение тут.";
        let parts = chunk_message(para, 50);
        assert_eq!(
            parts,
            vec![
                "Первое предложение тут. Второе предложение тут.".to_string(),
                "Третье предложение тут.".to_string()
            ]
        );
    }

    #[test]
    fn giant_sentence_is_truncated_with_ellipsis() {
        let msg = "x".repeat(100);
        let parts = chunk_message(&msg, 40);
        assert_eq!(parts, vec![format!("{}...", "x".repeat(37))]);
    }

    #[test]
    fn small_limit_is_honoured_exactly() {
        let parts = chunk_message(&"x".repeat(30), 10);
        assert_eq!(parts, vec![format!("{}...", "x".repeat(7))]);
        assert!(parts.iter().all(|p| char_len(p) <= 10));
    }

    #[test]
    fn tiny_limit_cuts_without_ellipsis() {
        assert_eq!(chunk_message("abcdef", 3), vec!["abc".to_string()]);
        assert_eq!(chunk_message("abcdef", 1), vec!["a".to_string()]);
        assert!(chunk_message("abcdef", 0).is_empty());
    }

    #[test]
    fn sentence_split_respects_bold_element() {
        let para = "<b>Один. Два.</b> Три. Четыре.";
        assert_eq!(
            split_sentences(para),
            vec!["<b>Один. Два.</b> Три. ", "Четыре."]
        );
    }
}
