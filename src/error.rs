// src/error.rs
//! Failures that cross the pipeline boundary.
//!
//! Parsing and rendering never fail; only collaborators (news service, image service,
//! delivery transport) and setup do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("news service failed: {0}")]
    NewsService(#[source] anyhow::Error),

    #[error("news service returned an empty reply")]
    EmptyResponse,

    #[error("image service failed: {0}")]
    ImageService(#[source] anyhow::Error),

    #[error("delivery failed at part {part}/{total}: {source}")]
    Delivery {
        part: usize,
        total: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("delivery executor unavailable: {0}")]
    Executor(String),
}

impl PipelineError {
    /// Short stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::NewsService(_) => "news_service",
            PipelineError::EmptyResponse => "empty_response",
            PipelineError::ImageService(_) => "image_service",
            PipelineError::Delivery { .. } => "delivery",
            PipelineError::Config(_) => "config",
            PipelineError::Executor(_) => "executor",
        }
    }
}
