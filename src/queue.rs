// src/queue.rs
//! In-memory queue of the day's collected items, published one per slot in priority order.

use chrono::NaiveDate;
use serde::Serialize;

use crate::parse::NewsItem;

/// Failed publications per item before it is given up on.
pub const MAX_ATTEMPTS: u8 = 3;

#[derive(Debug, Clone)]
struct QueuedItem {
    item: NewsItem,
    published: bool,
    /// Handed out by `reserve_next` and not yet marked.
    in_flight: bool,
    attempts: u8,
}

impl QueuedItem {
    fn eligible(&self) -> bool {
        !self.published && !self.in_flight && self.attempts < MAX_ATTEMPTS
    }
}

#[derive(Debug, Clone, Default)]
pub struct DailyQueue {
    collected_on: Option<NaiveDate>,
    items: Vec<QueuedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub collected_on: Option<NaiveDate>,
    pub total: usize,
    pub published: usize,
    pub pending: usize,
    pub given_up: usize,
    pub next_title: Option<String>,
}

impl DailyQueue {
    /// Replace the queue with a fresh batch; items are expected sorted by priority.
    pub fn replace(&mut self, date: NaiveDate, items: Vec<NewsItem>) {
        self.collected_on = Some(date);
        self.items = items
            .into_iter()
            .map(|item| QueuedItem {
                item,
                published: false,
                in_flight: false,
                attempts: 0,
            })
            .collect();
    }

    /// Index and a copy of the first item still eligible for publishing.
    pub fn next_unpublished(&self) -> Option<(usize, NewsItem)> {
        self.items
            .iter()
            .enumerate()
            .find(|(_, q)| q.eligible())
            .map(|(i, q)| (i, q.item.clone()))
    }

    /// Like [`next_unpublished`](Self::next_unpublished), but the item is held back from other
    /// callers until it is marked published or failed.
    pub fn reserve_next(&mut self) -> Option<(usize, NewsItem)> {
        let (idx, q) = self.items.iter_mut().enumerate().find(|(_, q)| q.eligible())?;
        q.in_flight = true;
        Some((idx, q.item.clone()))
    }

    /// No-op unless `idx` is currently reserved, so a batch replaced mid-publish is left alone.
    pub fn mark_published(&mut self, idx: usize) {
        if let Some(q) = self.items.get_mut(idx).filter(|q| q.in_flight) {
            q.in_flight = false;
            q.published = true;
            q.attempts = q.attempts.saturating_add(1);
        }
    }

    pub fn mark_failed(&mut self, idx: usize) {
        if let Some(q) = self.items.get_mut(idx).filter(|q| q.in_flight) {
            q.in_flight = false;
            q.attempts = q.attempts.saturating_add(1);
        }
    }

    pub fn status(&self) -> QueueStatus {
        let published = self.items.iter().filter(|q| q.published).count();
        let given_up = self
            .items
            .iter()
            .filter(|q| !q.published && q.attempts >= MAX_ATTEMPTS)
            .count();
        QueueStatus {
            collected_on: self.collected_on,
            total: self.items.len(),
            published,
            pending: self.items.len() - published - given_up,
            given_up,
            next_title: self.next_unpublished().map(|(_, item)| item.title),
        }
    }
}
