//! Timeframe Resolver - Human Time Expressions to Half-Open Windows
//!
//! Accepts a string like "yesterday", "last 7 days" or "since 2024-03-01"
//! and resolves it to a `(start, end)` pair in the executing host's local
//! time zone, or `None` when the expression is unrecognised.
//!
//! All grammars are case-sensitive. Negative, decimal and inner-whitespace
//! variants are rejected rather than guessed at.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone};
use regex::Regex;

/// A resolved timeframe: `start <= end`, local time zone.
pub type TimeWindow = (DateTime<Local>, DateTime<Local>);

/// Resolver for human time expressions.
///
/// Compiles its grammars once; cheap to clone around via reference.
#[derive(Debug)]
pub struct TimeframeResolver {
    last_n_unit: Regex,
    compact: Regex,
    ago: Regex,
    since: Regex,
}

impl TimeframeResolver {
    pub fn new() -> Self {
        Self {
            last_n_unit: Regex::new(
                r"^last (\d+) (minute|minutes|hour|hours|day|days|week|weeks|month|months|year|years)$",
            )
            .unwrap(),
            compact: Regex::new(r"^(\d+)([mhdwy])$").unwrap(),
            ago: Regex::new(r"^(\d+)([mhdwy]) ago$").unwrap(),
            since: Regex::new(r"^since (\d{4})-(\d{2})-(\d{2})( (\d{2}):(\d{2}):(\d{2}))?$")
                .unwrap(),
        }
    }

    /// Resolve against the current wall clock.
    pub fn resolve(&self, expr: &str) -> Option<TimeWindow> {
        self.resolve_at(expr, Local::now())
    }

    /// Resolve against an explicit "now". The seam the tests use.
    pub fn resolve_at(&self, expr: &str, now: DateTime<Local>) -> Option<TimeWindow> {
        if let Some(window) = self.named_window(expr, now) {
            return Some(window);
        }

        if let Some(caps) = self.last_n_unit.captures(expr) {
            let n: i64 = caps[1].parse().ok()?;
            return relative_window(now, n, &caps[2]);
        }

        if let Some(caps) = self.compact.captures(expr).or_else(|| self.ago.captures(expr)) {
            let n: i64 = caps[1].parse().ok()?;
            return relative_window(now, n, &caps[2]);
        }

        if let Some(caps) = self.since.captures(expr) {
            let date = NaiveDate::from_ymd_opt(
                caps[1].parse().ok()?,
                caps[2].parse().ok()?,
                caps[3].parse().ok()?,
            )?;
            let time = match caps.get(4) {
                Some(_) => date.and_hms_opt(
                    caps[5].parse().ok()?,
                    caps[6].parse().ok()?,
                    caps[7].parse().ok()?,
                )?,
                None => date.and_hms_opt(0, 0, 0)?,
            };
            let start = Local.from_local_datetime(&time).earliest()?;
            // A future anchor yields a degenerate window rather than an
            // inverted one.
            let end = if start > now { start } else { now };
            return Some((start, end));
        }

        None
    }

    /// True when the expression belongs to one of the resolver's grammars,
    /// whether or not it resolves to a window. Admission uses this so the
    /// validator and the resolver cannot disagree on what is structurally
    /// well-formed.
    pub fn recognises(&self, expr: &str) -> bool {
        self.resolve_at(expr, Local::now()).is_some()
            || self.last_n_unit.is_match(expr)
            || self.compact.is_match(expr)
            || self.ago.is_match(expr)
            || self.since.is_match(expr)
    }

    fn named_window(&self, expr: &str, now: DateTime<Local>) -> Option<TimeWindow> {
        match expr {
            "today" => Some((midnight(now.date_naive())?, now)),
            "yesterday" => {
                let start = midnight(now.date_naive().pred_opt()?)?;
                let end = midnight(now.date_naive())? - Duration::nanoseconds(1);
                Some((start, end))
            }
            "this week" => {
                let monday = now.date_naive()
                    - Duration::days(now.weekday().num_days_from_monday() as i64);
                Some((midnight(monday)?, now))
            }
            "last week" => {
                let this_monday = now.date_naive()
                    - Duration::days(now.weekday().num_days_from_monday() as i64);
                let last_monday = this_monday - Duration::days(7);
                let end = midnight(this_monday)? - Duration::nanoseconds(1);
                Some((midnight(last_monday)?, end))
            }
            "this month" => {
                let first = now.date_naive().with_day(1)?;
                Some((midnight(first)?, now))
            }
            "last month" => {
                let this_first = now.date_naive().with_day(1)?;
                let last_first = if this_first.month() == 1 {
                    NaiveDate::from_ymd_opt(this_first.year() - 1, 12, 1)?
                } else {
                    NaiveDate::from_ymd_opt(this_first.year(), this_first.month() - 1, 1)?
                };
                let end = midnight(this_first)? - Duration::nanoseconds(1);
                Some((midnight(last_first)?, end))
            }
            "last hour" => Some((now - Duration::hours(1), now)),
            "24h" | "last 24 hours" => Some((now - Duration::hours(24), now)),
            "7d" | "last 7 days" => Some((now - Duration::days(7), now)),
            "last 30 days" => Some((now - Duration::days(30), now)),
            _ => None,
        }
    }
}

impl Default for TimeframeResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Window ending at `now`, starting `n` units back. Overflowing spans
/// resolve to `None` rather than panicking.
fn relative_window(now: DateTime<Local>, n: i64, unit: &str) -> Option<TimeWindow> {
    let span = match unit {
        "m" | "minute" | "minutes" => Duration::try_minutes(n)?,
        "h" | "hour" | "hours" => Duration::try_hours(n)?,
        "d" | "day" | "days" => Duration::try_days(n)?,
        "w" | "week" | "weeks" => Duration::try_days(n.checked_mul(7)?)?,
        "month" | "months" => Duration::try_days(n.checked_mul(30)?)?,
        "y" | "year" | "years" => Duration::try_days(n.checked_mul(365)?)?,
        _ => return None,
    };
    let start = now.checked_sub_signed(span)?;
    Some((start, now))
}

/// Local midnight of a calendar day. `None` only when the local zone has no
/// representation for it (DST gap).
fn midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
}
