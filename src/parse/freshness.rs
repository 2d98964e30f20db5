// src/parse/freshness.rs
//! Freshness gate: is the date a reply talks about recent enough to publish?
//!
//! `now` is always passed in, so the classification is a pure function of (content, now).

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::dates::{DateExtractor, YearPolicy};

const SECS_PER_DAY: i64 = 86_400;

/// Config-level choice for year-less dates, resolved against `now` at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplicitYear {
    #[default]
    RequireExplicit,
    CurrentYear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    pub max_age_days: i64,
    pub implicit_year: ImplicitYear,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            max_age_days: 3,
            implicit_year: ImplicitYear::RequireExplicit,
        }
    }
}

impl FreshnessPolicy {
    pub fn with_max_age(max_age_days: i64) -> Self {
        Self {
            max_age_days,
            ..Self::default()
        }
    }

    fn extractor(&self, now: NaiveDateTime) -> DateExtractor {
        match self.implicit_year {
            ImplicitYear::RequireExplicit => DateExtractor::new(YearPolicy::RequireExplicit),
            ImplicitYear::CurrentYear => DateExtractor::new(YearPolicy::Assume(now.year())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Undated,
    Future,
    Fresh,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Freshness {
    pub verdict: Verdict,
    pub date: Option<NaiveDate>,
    /// Whole days between the date and `now`, floored; negative for future dates.
    pub age_days: Option<i64>,
    pub reason: String,
}

impl Freshness {
    pub fn is_fresh(&self) -> bool {
        matches!(self.verdict, Verdict::Future | Verdict::Fresh)
    }
}

/// Classify `content` relative to `now` (local wall clock of the channel).
pub fn classify(content: &str, policy: &FreshnessPolicy, now: NaiveDateTime) -> Freshness {
    let Some(date) = policy.extractor(now).extract(content) else {
        return Freshness {
            verdict: Verdict::Undated,
            date: None,
            age_days: None,
            reason: "date not found".to_string(),
        };
    };

    let age = whole_days_between(now, date);
    let shown = date.format("%d.%m.%Y");
    let (verdict, reason) = if age < 0 {
        (Verdict::Future, format!("future effective date ({shown})"))
    } else if age <= policy.max_age_days {
        (Verdict::Fresh, format!("fresh: {age} days old ({shown})"))
    } else {
        (Verdict::Stale, format!("stale: {age} days old ({shown})"))
    };

    Freshness {
        verdict,
        date: Some(date),
        age_days: Some(age),
        reason,
    }
}

/// Tuple form: `(is_fresh, reason)`.
pub fn is_content_fresh(content: &str, max_age_days: i64, now: NaiveDateTime) -> (bool, String) {
    let f = classify(content, &FreshnessPolicy::with_max_age(max_age_days), now);
    (f.is_fresh(), f.reason)
}

/// Hint appended to the next research prompt after a rejected reply; empty when nothing to say.
pub fn date_feedback(f: &Freshness) -> String {
    match (f.verdict, f.date) {
        (Verdict::Stale, Some(date)) => format!(
            "Предыдущий ответ был устаревшим: новость от {} ({} дн. назад). Найди более свежую новость и укажи точную дату.",
            date.format("%d.%m.%Y"),
            f.age_days.unwrap_or_default()
        ),
        (Verdict::Undated, _) => {
            "В предыдущем ответе не было даты. Обязательно укажи точную дату публикации или вступления в силу.".to_string()
        }
        _ => String::new(),
    }
}

fn whole_days_between(now: NaiveDateTime, date: NaiveDate) -> i64 {
    let start = date.and_time(NaiveTime::MIN);
    (now - start).num_seconds().div_euclid(SECS_PER_DAY)
}
