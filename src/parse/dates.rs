// src/parse/dates.rs
//! Date extraction from free-form Russian news text.
//!
//! Pattern families are tried in a fixed order and the first family that yields a valid
//! calendar date wins, regardless of where in the text other families would match:
//!
//! 1. `15 марта 2025`
//! 2. `с 15 марта` (no year; resolved through [`YearPolicy`])
//! 3. `15.03.2025`
//! 4. `2025-03-15`
//!
//! Families 3 and 4 share one global heuristic: if the input contains a `.` anywhere, numeric
//! triples are read as day/month/year, otherwise as year/month/day. A `2025-3-15` inside text that
//! also contains a full stop therefore does not parse. Matches that are not real dates are skipped.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Genitive month names, index 0 = January.
pub const MONTHS_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

static FULL_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"([0-9]{{1,2}})\s+({})\s+([0-9]{{4}})",
        MONTHS_GENITIVE.join("|")
    ))
    .unwrap()
});

static EFFECTIVE_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"с\s+([0-9]{{1,2}})\s+({})",
        MONTHS_GENITIVE.join("|")
    ))
    .unwrap()
});

static DOTTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{1,2})\.([0-9]{1,2})\.([0-9]{4})").unwrap());

static ISO_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]{4})-([0-9]{1,2})-([0-9]{1,2})").unwrap());

/// How to resolve `с 15 марта`, which carries no year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YearPolicy {
    /// Never produce a date from the year-less pattern.
    #[default]
    RequireExplicit,
    /// Use this year for year-less matches.
    Assume(i32),
}

/// Order of the three numeric groups, decided once per input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericOrder {
    DayMonthYear,
    YearMonthDay,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DateExtractor {
    year_policy: YearPolicy,
}

impl DateExtractor {
    pub fn new(year_policy: YearPolicy) -> Self {
        Self { year_policy }
    }

    pub fn year_policy(&self) -> YearPolicy {
        self.year_policy
    }

    /// Return the most plausible date mentioned in `content`, or `None`.
    pub fn extract(&self, content: &str) -> Option<NaiveDate> {
        let lower = content.to_lowercase();

        if let Some(d) = first_valid(&FULL_DATE, &lower, |c| {
            let month = month_number(c.get(2)?.as_str())?;
            ymd(num(c.get(3)?)?, month, num(c.get(1)?)?)
        }) {
            return Some(d);
        }

        if let YearPolicy::Assume(year) = self.year_policy {
            if let Some(d) = first_valid(&EFFECTIVE_FROM, &lower, |c| {
                let month = month_number(c.get(2)?.as_str())?;
                ymd(year, month, num(c.get(1)?)?)
            }) {
                return Some(d);
            }
        }

        let order = if content.contains('.') {
            NumericOrder::DayMonthYear
        } else {
            NumericOrder::YearMonthDay
        };

        for family in [&*DOTTED, &*ISO_LIKE] {
            if let Some(d) = first_valid(family, &lower, |c| numeric_triple(c, order)) {
                return Some(d);
            }
        }

        None
    }
}

/// Extract with the default policy (year-less phrases are ignored).
pub fn extract_date(content: &str) -> Option<NaiveDate> {
    DateExtractor::default().extract(content)
}

/// Month number (1..=12) for a genitive month name.
pub fn month_number(name: &str) -> Option<u32> {
    MONTHS_GENITIVE
        .iter()
        .position(|m| *m == name)
        .map(|i| i as u32 + 1)
}

fn first_valid<F>(re: &Regex, haystack: &str, parse: F) -> Option<NaiveDate>
where
    F: Fn(&regex::Captures<'_>) -> Option<NaiveDate>,
{
    re.captures_iter(haystack).find_map(|c| {
        let parsed = parse(&c);
        if parsed.is_none() {
            tracing::trace!(target: "dates", matched = %c.get(0).map_or("", |m| m.as_str()), "skipping invalid date");
        }
        parsed
    })
}

fn numeric_triple(c: &regex::Captures<'_>, order: NumericOrder) -> Option<NaiveDate> {
    let (a, b, z) = (num(c.get(1)?)?, num(c.get(2)?)?, num(c.get(3)?)?);
    match order {
        NumericOrder::DayMonthYear => ymd(z, b as u32, a),
        NumericOrder::YearMonthDay => ymd(a, b as u32, z),
    }
}

fn num(m: regex::Match<'_>) -> Option<i32> {
    m.as_str().parse().ok()
}

fn ymd(year: i32, month: u32, day: i32) -> Option<NaiveDate> {
    if year < 1 || day < 1 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day as u32)
}
