// src/lib.rs
// Public library surface for the service, the preview CLI and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod parse;
pub mod pipeline;
pub mod queue;
pub mod render;

pub use crate::api::router;
pub use crate::error::PipelineError;
pub use crate::parse::{extract_sources, parse_batch, ExtractedContent, NewsItem};
pub use crate::render::{chunk_message, format_message};

use std::sync::Arc;

use axum::Router;
use tracing::{info, warn};

use crate::api::AppState;
use crate::config::AppConfig;
use crate::ingest::{OpenAiImageSource, PerplexityNewsSource, PublicationSchedule};
use crate::metrics::Metrics;
use crate::notify::{Publisher, SimilarityGuard, TelegramTransport};
use crate::pipeline::Pipeline;

/// Build the HTTP app from the environment and, when credentials are present, start the scheduler.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::from_env()?;
    let schedule = PublicationSchedule::from_config(&cfg.schedule)?;

    let metrics = match Metrics::init() {
        Ok(m) => m,
        Err(e) => {
            warn!(error = ?e, "metrics recorder unavailable, /metrics will be empty");
            Metrics::detached()
        }
    };

    let mut state = AppState::preview_only(
        cfg.pipeline.freshness_policy(),
        cfg.pipeline.limits(),
        schedule.offset(),
    );

    if let Some(pipeline) = build_pipeline(&cfg, &schedule) {
        let pipeline = Arc::new(pipeline);
        ingest::spawn_scheduler(Arc::clone(&pipeline), schedule);
        state.pipeline = Some(pipeline);
        info!("scheduler started");
    } else {
        warn!("news or channel credentials missing; running preview-only");
    }

    Ok(router(state).merge(metrics.router()))
}

fn build_pipeline(cfg: &AppConfig, schedule: &PublicationSchedule) -> Option<Pipeline> {
    let (Some(pplx_key), Some(token), Some(channel)) = (
        cfg.perplexity_api_key.clone(),
        cfg.telegram_bot_token.clone(),
        cfg.telegram_channel_id.clone(),
    ) else {
        return None;
    };

    let news = PerplexityNewsSource::new(pplx_key)
        .with_url(cfg.perplexity_api_url.clone())
        .with_model(cfg.perplexity_model.clone())
        .with_timeout(cfg.request_timeout_secs);
    let transport = TelegramTransport::new(token, channel);
    let publisher = Publisher::new(Arc::new(transport), cfg.pipeline.limits())
        .with_guard(Box::new(SimilarityGuard::default()));

    let mut pipeline = Pipeline::new(
        Arc::new(news),
        Arc::new(publisher),
        cfg.pipeline.clone(),
        schedule.offset(),
    );
    match (&cfg.openai_api_key, cfg.pipeline.with_images) {
        (Some(key), true) => {
            pipeline = pipeline.with_images(Arc::new(OpenAiImageSource::new(key.clone())));
        }
        (None, true) => warn!("OPENAI_API_KEY missing; posts go out without images"),
        _ => {}
    }
    Some(pipeline)
}
