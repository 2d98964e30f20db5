// src/metrics.rs
use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

/// One-time registration so every series shows up on /metrics before its first increment.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs by mode (single, collect, publish).");
        describe_counter!(
            "pipeline_sources_fallback_total",
            "Replies whose sources did not come from a sources section."
        );
        describe_counter!("pipeline_stale_total", "Replies classified as stale or undated.");
        describe_counter!("delivery_parts_total", "Message parts handed to the transport.");
        describe_counter!("delivery_errors_total", "Message parts the transport failed to deliver.");
        describe_histogram!("pipeline_format_ms", "Message formatting time in milliseconds.");
    });
}

impl Metrics {
    /// Install the global Prometheus recorder. Fails if another recorder is already installed.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// A recorder that is not installed globally; renders an empty exposition.
    pub fn detached() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        Self {
            handle: recorder.handle(),
        }
    }

    /// Router exposing `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
