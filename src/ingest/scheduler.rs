// src/ingest/scheduler.rs
//! Daily timetable: one collection run, then publication slots, in the channel's local time.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::error::PipelineError;
use crate::pipeline::Pipeline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub utc_offset_hours: i32,
    pub collection_time: String,
    pub publication_times: Vec<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 3,
            collection_time: "08:30".to_string(),
            publication_times: ["09:05", "11:03", "13:07", "15:09", "17:05", "19:02", "21:07"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    Collect,
    /// Zero-based index into the publication slots.
    Publish { slot: usize },
}

#[derive(Debug, Clone)]
pub struct PublicationSchedule {
    offset: FixedOffset,
    /// Sorted by local time.
    events: Vec<(NaiveTime, ScheduledJob)>,
}

impl PublicationSchedule {
    pub fn from_config(cfg: &ScheduleConfig) -> Result<Self, PipelineError> {
        let offset = FixedOffset::east_opt(cfg.utc_offset_hours * 3600).ok_or_else(|| {
            PipelineError::Config(format!("utc_offset_hours out of range: {}", cfg.utc_offset_hours))
        })?;

        let mut events = vec![(parse_hm(&cfg.collection_time)?, ScheduledJob::Collect)];
        for (slot, t) in cfg.publication_times.iter().enumerate() {
            events.push((parse_hm(t)?, ScheduledJob::Publish { slot }));
        }
        events.sort_by_key(|(t, _)| *t);

        Ok(Self { offset, events })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn slots(&self) -> usize {
        self.events
            .iter()
            .filter(|(_, j)| matches!(j, ScheduledJob::Publish { .. }))
            .count()
    }

    /// First event strictly after `now`; rolls over to the next local day.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, ScheduledJob)> {
        let today = now.with_timezone(&self.offset).date_naive();
        for day in 0..=1 {
            let date = today + Duration::days(day);
            for (time, job) in &self.events {
                let at = self
                    .offset
                    .from_local_datetime(&date.and_time(*time))
                    .single()?
                    .with_timezone(&Utc);
                if at > now {
                    return Some((at, *job));
                }
            }
        }
        None
    }
}

fn parse_hm(s: &str) -> Result<NaiveTime, PipelineError> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .map_err(|e| PipelineError::Config(format!("bad schedule time {s:?}: {e}")))
}

/// Run the timetable forever on the current runtime.
pub fn spawn_scheduler(pipeline: Arc<Pipeline>, schedule: PublicationSchedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let Some((at, job)) = schedule.next_after(now) else {
                tracing::error!(target: "scheduler", "schedule has no events, stopping");
                return;
            };
            tracing::info!(target: "scheduler", at = %at.with_timezone(&schedule.offset()), ?job, "next job");
            tokio::time::sleep((at - now).to_std().unwrap_or_default()).await;

            match job {
                ScheduledJob::Collect => match pipeline.collect_daily(Utc::now()).await {
                    Ok(n) => tracing::info!(target: "scheduler", items = n, "daily batch collected"),
                    Err(e) => tracing::warn!(target: "scheduler", kind = e.kind(), error = %e, "collection failed"),
                },
                ScheduledJob::Publish { slot } => match pipeline.publish_next().await {
                    Ok(Some(report)) => {
                        tracing::info!(target: "scheduler", slot, parts = report.parts_sent, "slot published")
                    }
                    Ok(None) => tracing::info!(target: "scheduler", slot, "queue empty, slot skipped"),
                    Err(e) => tracing::warn!(target: "scheduler", slot, kind = e.kind(), error = %e, "publication failed"),
                },
            }
        }
    })
}
