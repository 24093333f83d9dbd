//! Log-File Planner - Choosing `--path=` Targets
//!
//! Given a source and a resolved timeframe, decides whether the query reads
//! the live log, or the live log plus a bounded fan-out over plausible
//! rotated files. The planner never consults the cluster: the CLI produces
//! empty output for paths that do not exist, and that is acceptable.

use crate::timeframe::TimeWindow;
use crate::types::LogSource;
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::collections::HashSet;

/// Hard cap on plan cardinality.
pub const MAX_FILE_TARGETS: usize = 50;

/// One `--path=` argument in a compiled pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileTarget {
    /// Relative path under the node log root, e.g. `kube-apiserver/audit.log`.
    pub path: String,
    /// Whether this is the currently written file.
    pub live: bool,
    /// For rotated targets, the calendar day the file is believed to cover.
    pub rotated_date: Option<NaiveDate>,
}

impl LogFileTarget {
    fn live(source: LogSource) -> Self {
        Self {
            path: source.live_log_path(),
            live: true,
            rotated_date: None,
        }
    }

    fn rotated(path: String, date: NaiveDate) -> Self {
        Self {
            path,
            live: false,
            rotated_date: Some(date),
        }
    }

    /// The full CLI argument for this target.
    pub fn path_arg(&self) -> String {
        format!("--path={}", self.path)
    }
}

/// Plan the target set for `(source, timeframe)` against the current clock.
pub fn plan(source: LogSource, timeframe: Option<&TimeWindow>) -> Vec<LogFileTarget> {
    plan_at(source, timeframe, Local::now())
}

/// Plan against an explicit "now". At least one target is always returned.
pub fn plan_at(
    source: LogSource,
    timeframe: Option<&TimeWindow>,
    now: DateTime<Local>,
) -> Vec<LogFileTarget> {
    let window = match timeframe {
        Some(w) => w,
        None => return vec![LogFileTarget::live(source)],
    };

    // A window anchored at today's midnight ("today") never needs rotated
    // files; the live log covers the whole day.
    let today_midnight = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|t| t == window.0.naive_local());
    if today_midnight == Some(true) {
        return vec![LogFileTarget::live(source)];
    }

    historical_plan(source, window)
}

/// The live file plus day-by-day rotated candidates across the window.
fn historical_plan(source: LogSource, window: &TimeWindow) -> Vec<LogFileTarget> {
    let mut targets = vec![LogFileTarget::live(source)];
    let mut seen: HashSet<String> = targets.iter().map(|t| t.path.clone()).collect();

    let dir = source.log_dir();
    let start = window.0.date_naive();
    let end = window.1.date_naive();

    let mut day = start;
    while day <= end && targets.len() < MAX_FILE_TARGETS {
        for name in rotated_candidates(day) {
            if targets.len() >= MAX_FILE_TARGETS {
                break;
            }
            let path = format!("{}/{}", dir, name);
            if seen.insert(path.clone()) {
                targets.push(LogFileTarget::rotated(path, day));
            }
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    targets
}

/// Plausible rotated filenames for one calendar day: numeric rotation
/// suffixes 1-3 and the date-stamped form, each plain and compressed.
fn rotated_candidates(day: NaiveDate) -> Vec<String> {
    let mut names = Vec::new();
    for n in 1..=3 {
        names.push(format!("audit.log.{}", n));
        names.push(format!("audit.log.{}.gz", n));
        names.push(format!("audit.log.{}.bz2", n));
    }
    let stamp = format!(
        "{:04}-{:02}-{:02}",
        day.year(),
        day.month(),
        day.day()
    );
    names.push(format!("audit-{}.log", stamp));
    names.push(format!("audit-{}.log.gz", stamp));
    names.push(format!("audit-{}.log.bz2", stamp));
    names
}

/// Days covered by a window, inclusive on both calendar ends.
pub fn days_in_window(window: &TimeWindow) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = window.0.date_naive();
    let end = window.1.date_naive();
    while day <= end {
        days.push(day);
        if days.len() >= MAX_FILE_TARGETS {
            break;
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeframe::TimeframeResolver;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn window_for(expr: &str) -> TimeWindow {
        TimeframeResolver::new()
            .resolve_at(expr, fixed_now())
            .unwrap()
    }

    #[test]
    fn test_no_timeframe_is_live_only() {
        let targets = plan_at(LogSource::KubeApiserver, None, fixed_now());
        assert_eq!(targets.len(), 1);
        assert!(targets[0].live);
        assert_eq!(targets[0].path, "kube-apiserver/audit.log");
    }

    #[test]
    fn test_node_source_uses_audit_dir() {
        let targets = plan_at(LogSource::Node, None, fixed_now());
        assert_eq!(targets[0].path, "audit/audit.log");
    }

    #[test]
    fn test_today_is_live_only() {
        let window = window_for("today");
        let targets = plan_at(LogSource::KubeApiserver, Some(&window), fixed_now());
        assert_eq!(targets.len(), 1);
        assert!(targets[0].live);
    }

    #[test]
    fn test_yesterday_adds_rotated_candidates() {
        let window = window_for("yesterday");
        let targets = plan_at(LogSource::KubeApiserver, Some(&window), fixed_now());

        assert!(targets[0].live, "live file comes first");
        assert!(targets.len() > 1, "historical plan has rotated candidates");
        let date_stamped = targets
            .iter()
            .any(|t| t.path == "kube-apiserver/audit-2024-03-14.log");
        assert!(date_stamped);
        assert!(targets
            .iter()
            .skip(1)
            .all(|t| t.rotated_date == Some(NaiveDate::from_ymd_opt(2024, 3, 14).unwrap())));
    }

    #[test]
    fn test_numeric_suffixes_not_duplicated_across_days() {
        let window = window_for("last 7 days");
        let targets = plan_at(LogSource::KubeApiserver, Some(&window), fixed_now());
        let count = targets
            .iter()
            .filter(|t| t.path == "kube-apiserver/audit.log.1")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_plan_capped_at_fifty_targets() {
        let window = window_for("last 30 days");
        let targets = plan_at(LogSource::KubeApiserver, Some(&window), fixed_now());
        assert!(targets.len() <= MAX_FILE_TARGETS);
        assert!(!targets.is_empty());
    }

    #[test]
    fn test_every_target_has_path_arg() {
        let window = window_for("yesterday");
        for target in plan_at(LogSource::OauthServer, Some(&window), fixed_now()) {
            assert!(target.path_arg().starts_with("--path=oauth-server/"));
        }
    }
}
