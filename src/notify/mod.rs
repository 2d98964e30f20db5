// src/notify/mod.rs
//! Delivery: plan the parts of a message and hand them to a transport in order.

pub mod dedup;
pub mod executor;
pub mod telegram;

use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Result;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::parse::ExtractedContent;
use crate::render::{chunk_message, format_message, markup::char_len};

pub use dedup::{DuplicateGuard, NoopGuard, SimilarityGuard};
pub use executor::{BlockingPublisher, DeliveryExecutor};
pub use telegram::TelegramTransport;

/// Per-part size limits of the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLimits {
    /// Standalone text message.
    pub message_limit: usize,
    /// Caption attached to a photo.
    pub caption_limit: usize,
}

impl Default for DeliveryLimits {
    fn default() -> Self {
        Self {
            message_limit: 4000,
            caption_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryPart {
    Photo { caption: Option<String> },
    Text(String),
}

/// Parts of one post, in sending order.
pub type DeliveryPlan = Vec<DeliveryPart>;

/// Order of parts for `message`: the photo (captioned when the message fits) then text chunks.
pub fn plan_delivery(message: &str, with_image: bool, limits: &DeliveryLimits) -> DeliveryPlan {
    if with_image && char_len(message) <= limits.caption_limit {
        return vec![DeliveryPart::Photo {
            caption: Some(message.to_string()),
        }];
    }

    let mut parts = Vec::new();
    if with_image {
        parts.push(DeliveryPart::Photo { caption: None });
    }
    parts.extend(
        chunk_message(message, limits.message_limit)
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .map(DeliveryPart::Text),
    );
    parts
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one HTML text message.
    async fn send_text(&self, text: &str) -> Result<()>;
    /// Send a PNG image, optionally with an HTML caption.
    async fn send_photo(&self, image: &[u8], caption: Option<&str>) -> Result<()>;
    /// Called between consecutive parts of one message.
    async fn pace(&self) {}
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryRequest {
    pub content: ExtractedContent,
    pub image: Option<Vec<u8>>,
}

impl DeliveryRequest {
    pub fn text(content: ExtractedContent) -> Self {
        Self {
            content,
            image: None,
        }
    }

    pub fn with_image(content: ExtractedContent, image: Vec<u8>) -> Self {
        Self {
            content,
            image: Some(image),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DeliveryReport {
    pub parts_sent: usize,
    pub skipped_duplicate: bool,
}

/// Formats, deduplicates and sends messages through a caller-owned transport.
pub struct Publisher {
    transport: Arc<dyn Transport>,
    limits: DeliveryLimits,
    guard: Mutex<Box<dyn DuplicateGuard>>,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, limits: DeliveryLimits) -> Self {
        Self {
            transport,
            limits,
            guard: Mutex::new(Box::new(NoopGuard)),
        }
    }

    pub fn with_guard(mut self, guard: Box<dyn DuplicateGuard>) -> Self {
        self.guard = Mutex::new(guard);
        self
    }

    pub fn limits(&self) -> &DeliveryLimits {
        &self.limits
    }

    pub async fn publish(&self, req: &DeliveryRequest) -> Result<DeliveryReport, PipelineError> {
        let started = Instant::now();
        let message = format_message(&req.content);
        histogram!("pipeline_format_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        if self.guard_check(&message) {
            tracing::warn!(target: "notify", "message duplicates a recent post, skipping");
            return Ok(DeliveryReport {
                parts_sent: 0,
                skipped_duplicate: true,
            });
        }

        let parts = plan_delivery(&message, req.image.is_some(), &self.limits);
        let total = parts.len();
        tracing::info!(
            target: "notify",
            transport = self.transport.name(),
            parts = total,
            with_image = req.image.is_some(),
            "delivering message"
        );

        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.transport.pace().await;
            }
            let sent = match part {
                DeliveryPart::Photo { caption } => {
                    let image = req.image.as_deref().unwrap_or_default();
                    self.transport.send_photo(image, caption.as_deref()).await
                }
                DeliveryPart::Text(text) => self.transport.send_text(text).await,
            };
            if let Err(source) = sent {
                counter!("delivery_errors_total").increment(1);
                tracing::warn!(target: "notify", part = i + 1, total, error = ?source, "delivery part failed");
                return Err(PipelineError::Delivery {
                    part: i + 1,
                    total,
                    source,
                });
            }
            counter!("delivery_parts_total").increment(1);
        }

        if let Ok(mut guard) = self.guard.lock() {
            guard.record(&message);
        }
        Ok(DeliveryReport {
            parts_sent: total,
            skipped_duplicate: false,
        })
    }

    fn guard_check(&self, message: &str) -> bool {
        match self.guard.lock() {
            Ok(guard) => guard.is_duplicate(message),
            // a poisoned guard must not block publishing
            Err(_) => false,
        }
    }
}
