// src/pipeline.rs
//! End-to-end runs: research reply → extracted content → freshness gate → delivery.
//!
//! Single mode fetches one item and publishes it right away. Batch mode collects the day's
//! ranked items into a [`DailyQueue`] and publishes one per scheduled slot.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use metrics::counter;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ingest::prompts::{
    comic_context, comic_prompt, daily_collection_request, single_news_request,
};
use crate::ingest::{ImageSource, NewsSource};
use crate::notify::{DeliveryReport, DeliveryRequest, Publisher};
use crate::parse::sources::extract_sources_with_origin;
use crate::parse::{
    classify, date_feedback, parse_batch, ExtractedContent, Freshness, FreshnessPolicy, SourceOrigin,
};
use crate::queue::{DailyQueue, QueueStatus};

/// Fetches per single run when stale replies are rejected.
const STALE_REFETCHES: usize = 2;

/// Short stable id for logs; raw text is never logged.
pub(crate) fn content_id(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// A raw reply run through extraction and the freshness gate.
#[derive(Debug, Clone, Serialize)]
pub struct Prepared {
    pub content: ExtractedContent,
    pub origin: SourceOrigin,
    pub freshness: Freshness,
}

/// Pure part of a run: no I/O, `now` is the channel's local wall clock.
pub fn prepare(raw: &str, policy: &FreshnessPolicy, now: NaiveDateTime) -> Prepared {
    let (content, origin) = extract_sources_with_origin(raw);
    let freshness = classify(raw, policy, now);
    Prepared {
        content,
        origin,
        freshness,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ImageStatus {
    Attached,
    Disabled,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Published {
        report: DeliveryReport,
        freshness: Freshness,
        image: ImageStatus,
    },
    SkippedStale {
        freshness: Freshness,
    },
}

pub struct Pipeline {
    news: Arc<dyn NewsSource>,
    images: Option<Arc<dyn ImageSource>>,
    publisher: Arc<Publisher>,
    settings: PipelineConfig,
    offset: FixedOffset,
    queue: Mutex<DailyQueue>,
}

impl Pipeline {
    pub fn new(
        news: Arc<dyn NewsSource>,
        publisher: Arc<Publisher>,
        settings: PipelineConfig,
        offset: FixedOffset,
    ) -> Self {
        Self {
            news,
            images: None,
            publisher,
            settings,
            offset,
            queue: Mutex::new(DailyQueue::default()),
        }
    }

    pub fn with_images(mut self, images: Arc<dyn ImageSource>) -> Self {
        self.images = Some(images);
        self
    }

    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    pub fn publisher(&self) -> Arc<Publisher> {
        Arc::clone(&self.publisher)
    }

    fn local(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.offset).naive_local()
    }

    /// Fetch one item, gate it on freshness and publish it.
    pub async fn run_single(&self, now: DateTime<Utc>) -> Result<RunOutcome, PipelineError> {
        counter!("pipeline_runs_total", "mode" => "single").increment(1);
        let local = self.local(now);
        let policy = self.settings.freshness_policy();
        let attempts = if self.settings.skip_stale { STALE_REFETCHES } else { 1 };

        let mut feedback = String::new();
        let mut prepared = None;
        for attempt in 1..=attempts {
            let req = single_news_request(local.date(), &feedback);
            let raw = self
                .news
                .fetch(&req)
                .await
                .map_err(PipelineError::NewsService)?;
            if raw.trim().is_empty() {
                return Err(PipelineError::EmptyResponse);
            }

            let p = prepare(&raw, &policy, local);
            self.log_prepared(&p);
            if p.freshness.is_fresh() || !self.settings.skip_stale {
                prepared = Some(p);
                break;
            }
            counter!("pipeline_stale_total").increment(1);
            tracing::warn!(target: "pipeline", attempt, reason = %p.freshness.reason, "reply rejected as not fresh");
            feedback = date_feedback(&p.freshness);
            if attempt == attempts {
                return Ok(RunOutcome::SkippedStale {
                    freshness: p.freshness,
                });
            }
        }
        let Some(prepared) = prepared else {
            return Err(PipelineError::EmptyResponse);
        };
        if !prepared.freshness.is_fresh() {
            counter!("pipeline_stale_total").increment(1);
            tracing::warn!(target: "pipeline", reason = %prepared.freshness.reason, "publishing content that is not fresh");
        }

        let (req, image) = self.delivery_request(prepared.content).await;
        let report = self.publisher.publish(&req).await?;
        Ok(RunOutcome::Published {
            report,
            freshness: prepared.freshness,
            image,
        })
    }

    /// Fetch the day's ranked items into the queue; returns how many were parsed.
    pub async fn collect_daily(&self, now: DateTime<Utc>) -> Result<usize, PipelineError> {
        counter!("pipeline_runs_total", "mode" => "collect").increment(1);
        let local = self.local(now);
        let raw = self
            .news
            .fetch(&daily_collection_request(local.date()))
            .await
            .map_err(PipelineError::NewsService)?;
        if raw.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        let items = parse_batch(&raw);
        let policy = self.settings.freshness_policy();
        let stale = items
            .iter()
            .filter(|it| !classify(&it.body, &policy, local).is_fresh())
            .count();
        tracing::info!(
            target: "pipeline",
            id = %content_id(&raw),
            items = items.len(),
            not_fresh = stale,
            "daily batch parsed"
        );

        let n = items.len();
        if let Ok(mut q) = self.queue.lock() {
            q.replace(local.date(), items);
        }
        Ok(n)
    }

    /// Publish the next queued item; `None` when nothing is left for today.
    ///
    /// The item stays reserved while it is being delivered, so concurrent callers (a schedule
    /// slot and a manual trigger) never post the same item.
    pub async fn publish_next(&self) -> Result<Option<DeliveryReport>, PipelineError> {
        let next = match self.queue.lock() {
            Ok(mut q) => q.reserve_next(),
            Err(_) => return Err(PipelineError::Executor("queue lock poisoned".into())),
        };
        let Some((idx, item)) = next else {
            return Ok(None);
        };
        counter!("pipeline_runs_total", "mode" => "publish").increment(1);
        tracing::info!(target: "pipeline", priority = item.priority, id = %content_id(&item.title), "publishing queued item");

        let (req, _) = self.delivery_request(item.to_content()).await;
        let result = self.publisher.publish(&req).await;

        if let Ok(mut q) = self.queue.lock() {
            match &result {
                Ok(_) => q.mark_published(idx),
                Err(_) => q.mark_failed(idx),
            }
        }
        result.map(Some)
    }

    pub fn queue_status(&self) -> QueueStatus {
        self.queue
            .lock()
            .map(|q| q.status())
            .unwrap_or_else(|p| p.into_inner().status())
    }

    /// Attach an illustration when enabled; an image failure degrades to a text-only post.
    async fn delivery_request(&self, content: ExtractedContent) -> (DeliveryRequest, ImageStatus) {
        let images = match (&self.images, self.settings.with_images) {
            (Some(images), true) => images,
            _ => return (DeliveryRequest::text(content), ImageStatus::Disabled),
        };

        let mut context = comic_context(&content.body);
        if context.is_empty() {
            context = content.body.chars().take(200).collect();
        }
        match images.generate(&comic_prompt(&context)).await {
            Ok(bytes) => (DeliveryRequest::with_image(content, bytes), ImageStatus::Attached),
            Err(e) => {
                let e = PipelineError::ImageService(e);
                tracing::warn!(target: "pipeline", error = %e, "continuing without image");
                (DeliveryRequest::text(content), ImageStatus::Failed(e.to_string()))
            }
        }
    }

    fn log_prepared(&self, p: &Prepared) {
        if p.origin != SourceOrigin::Section {
            counter!("pipeline_sources_fallback_total").increment(1);
        }
        tracing::info!(
            target: "pipeline",
            id = %content_id(&p.content.body),
            origin = ?p.origin,
            sources = p.content.sources.len(),
            verdict = ?p.freshness.verdict,
            reason = %p.freshness.reason,
            "reply prepared"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn prepare_extracts_and_classifies() {
        let raw = "📜 Закон от 01.06.2025 [1]\n\nИСТОЧНИКИ:\n[1] https://a.ru/x";
        let p = prepare(raw, &FreshnessPolicy::default(), at(2025, 6, 2));
        assert_eq!(p.origin, SourceOrigin::Section);
        assert_eq!(p.content.sources, vec!["https://a.ru/x".to_string()]);
        assert!(p.freshness.is_fresh());
    }

    #[test]
    fn content_id_is_short_hex() {
        let id = content_id("текст");
        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
