// src/api.rs
//! Operator console: health, offline preview of a raw reply, queue status and manual publish.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::notify::{plan_delivery, DeliveryLimits, DeliveryPart};
use crate::parse::{Freshness, FreshnessPolicy, SourceOrigin};
use crate::pipeline::{prepare, Pipeline};
use crate::render::{chunk_message, format_message};

#[derive(Clone)]
pub struct AppState {
    pub policy: FreshnessPolicy,
    pub limits: DeliveryLimits,
    pub offset: FixedOffset,
    /// Absent when delivery credentials are not configured.
    pub pipeline: Option<Arc<Pipeline>>,
}

impl AppState {
    pub fn preview_only(policy: FreshnessPolicy, limits: DeliveryLimits, offset: FixedOffset) -> Self {
        Self {
            policy,
            limits,
            offset,
            pipeline: None,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/preview", post(preview))
        .route("/status", get(status))
        .route("/publish/next", post(publish_next))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct PreviewQuery {
    /// Local wall clock to classify against, `YYYY-MM-DDTHH:MM:SS`; defaults to now.
    now: Option<NaiveDateTime>,
    #[serde(default)]
    with_image: bool,
}

#[derive(Serialize)]
struct PreviewResp {
    body: String,
    sources: Vec<String>,
    origin: SourceOrigin,
    freshness: Freshness,
    formatted: String,
    chunks: Vec<String>,
    /// Part kinds in sending order: `photo`, `photo+caption` or `text`.
    plan: Vec<&'static str>,
}

async fn preview(
    State(st): State<AppState>,
    Query(q): Query<PreviewQuery>,
    raw: String,
) -> Json<PreviewResp> {
    let now = q
        .now
        .unwrap_or_else(|| Utc::now().with_timezone(&st.offset).naive_local());
    let prepared = prepare(&raw, &st.policy, now);
    let formatted = format_message(&prepared.content);
    let chunks = chunk_message(&formatted, st.limits.message_limit);
    let plan = plan_delivery(&formatted, q.with_image, &st.limits)
        .iter()
        .map(|p| match p {
            DeliveryPart::Photo { caption: Some(_) } => "photo+caption",
            DeliveryPart::Photo { caption: None } => "photo",
            DeliveryPart::Text(_) => "text",
        })
        .collect();

    Json(PreviewResp {
        body: prepared.content.body,
        sources: prepared.content.sources,
        origin: prepared.origin,
        freshness: prepared.freshness,
        formatted,
        chunks,
        plan,
    })
}

#[derive(Serialize)]
struct ErrorResp {
    kind: &'static str,
    error: String,
}

fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResp {
            kind: "config",
            error: "publishing is not configured".to_string(),
        }),
    )
        .into_response()
}

async fn status(State(st): State<AppState>) -> Response {
    match st.pipeline {
        Some(p) => Json(p.queue_status()).into_response(),
        None => unavailable(),
    }
}

async fn publish_next(State(st): State<AppState>) -> Response {
    let Some(p) = st.pipeline else {
        return unavailable();
    };
    match p.publish_next().await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResp {
                kind: e.kind(),
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}
