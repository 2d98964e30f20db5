// src/notify/dedup.rs
//! Near-duplicate gate for outgoing posts.
//! - Comparison ignores markup, emoji markers, dates, times and URLs.
//! - State is updated explicitly via `record` after a successful send.

use std::collections::VecDeque;

use once_cell::sync::Lazy;
use regex::Regex;
use strsim::normalized_levenshtein;

pub trait DuplicateGuard: Send {
    /// Check whether `message` repeats a recent post. Does NOT mutate state.
    fn is_duplicate(&self, message: &str) -> bool;
    fn record(&mut self, message: &str);
}

/// Lets everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGuard;

impl DuplicateGuard for NoopGuard {
    fn is_duplicate(&self, _message: &str) -> bool {
        false
    }

    fn record(&mut self, _message: &str) {}
}

/// Keeps the last `window` posts and rejects messages at least `threshold` similar to one of them.
#[derive(Debug, Clone)]
pub struct SimilarityGuard {
    threshold: f64,
    window: usize,
    recent: VecDeque<String>,
}

impl Default for SimilarityGuard {
    fn default() -> Self {
        Self::new(0.7, 3)
    }
}

impl SimilarityGuard {
    pub fn new(threshold: f64, window: usize) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
            window: window.max(1),
            recent: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

impl DuplicateGuard for SimilarityGuard {
    fn is_duplicate(&self, message: &str) -> bool {
        let probe = clean_for_comparison(message);
        if probe.is_empty() {
            return false;
        }
        self.recent.iter().any(|prev| {
            let sim = normalized_levenshtein(&probe, prev);
            if sim >= self.threshold {
                tracing::debug!(target: "notify", similarity = sim, "near-duplicate post");
                true
            } else {
                false
            }
        })
    }

    fn record(&mut self, message: &str) {
        self.recent.push_back(clean_for_comparison(message));
        while self.recent.len() > self.window {
            self.recent.pop_front();
        }
    }
}

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static MARKERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[🎭📅💬📜🔗🤖🕐]").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{1,2}\.[0-9]{1,2}\.[0-9]{4}").unwrap());
static TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{1,2}:[0-9]{2}").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://\S+").unwrap());

/// Lowercased text with markup, markers, dates, times and URLs removed and whitespace folded.
pub fn clean_for_comparison(text: &str) -> String {
    let s = TAG.replace_all(text, " ");
    let s = URL.replace_all(&s, " ");
    let s = MARKERS.replace_all(&s, " ");
    let s = DATE.replace_all(&s, " ");
    let s = TIME.replace_all(&s, " ");
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleaning_drops_noise() {
        let s = clean_for_comparison(
            "<b>📜 Закон</b> от 01.09.2025 в 10:30 <a href=\"https://x.ru\">[1]</a> https://y.ru",
        );
        assert_eq!(s, "закон от в [1]");
    }

    #[test]
    fn first_post_passes_repeat_blocked() {
        let mut g = SimilarityGuard::default();
        let msg = "📜 Закон о такси\n\nВодителям разрешили работать ночью.";
        assert!(!g.is_duplicate(msg));
        g.record(msg);
        let again = "📜 Закон о такси 02.09.2025\n\nВодителям разрешили работать ночью!";
        assert!(g.is_duplicate(again));
    }

    #[test]
    fn different_post_passes() {
        let mut g = SimilarityGuard::default();
        g.record("📜 Закон о такси\n\nВодителям разрешили работать ночью.");
        assert!(!g.is_duplicate("📜 Налоговый вычет\n\nСемьи получат возврат за спорт."));
    }

    #[test]
    fn window_evicts_oldest() {
        let mut g = SimilarityGuard::new(0.7, 2);
        g.record("первый пост про налоги");
        g.record("второй текст о штрафах");
        g.record("третий материал о льготах");
        assert_eq!(g.len(), 2);
        assert!(!g.is_duplicate("первый пост про налоги"));
    }

    #[test]
    fn noop_never_blocks() {
        let mut g = NoopGuard;
        g.record("x");
        assert!(!g.is_duplicate("x"));
    }
}
