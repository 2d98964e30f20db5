// src/ingest/mod.rs
//! Collaborators that produce raw material: the news research service and the image service.

pub mod image;
pub mod perplexity;
pub mod prompts;
pub mod scheduler;

use anyhow::Result;

pub use image::OpenAiImageSource;
pub use perplexity::PerplexityNewsSource;
pub use scheduler::{spawn_scheduler, PublicationSchedule, ScheduleConfig, ScheduledJob};

/// One chat-completion style request to the research service.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Single-item request for one post.
pub const SINGLE_MAX_TOKENS: u32 = 1000;
/// Daily collection of up to seven ranked items.
pub const COLLECTION_MAX_TOKENS: u32 = 8192;

#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    /// Free-text reply of the service; no schema is assumed.
    async fn fetch(&self, req: &NewsRequest) -> Result<String>;
    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    /// PNG bytes for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
    fn name(&self) -> &'static str;
}
