//! Summariser - Records to a One-Line Summary and Status Histogram

use crate::parser::AuditRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status-class buckets for the response-code histogram. The specific
/// buckets win over the generic 4xx one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusClasses {
    pub success: usize,
    pub auth_error: usize,
    pub not_found: usize,
    pub conflict: usize,
    pub client_error: usize,
    pub server_error: usize,
}

impl StatusClasses {
    fn count(&mut self, code: i64) {
        match code {
            200..=299 => self.success += 1,
            401 | 403 => self.auth_error += 1,
            404 => self.not_found += 1,
            409 => self.conflict += 1,
            400..=499 => self.client_error += 1,
            500..=599 => self.server_error += 1,
            _ => {}
        }
    }

    fn is_empty(&self) -> bool {
        self.success == 0
            && self.auth_error == 0
            && self.not_found == 0
            && self.conflict == 0
            && self.client_error == 0
            && self.server_error == 0
    }

    fn render(&self) -> String {
        let mut parts = Vec::new();
        for (label, count) in [
            ("success", self.success),
            ("auth_error", self.auth_error),
            ("not_found", self.not_found),
            ("conflict", self.conflict),
            ("client_error", self.client_error),
            ("server_error", self.server_error),
        ] {
            if count > 0 {
                parts.push(format!("{}: {}", label, count));
            }
        }
        parts.join(", ")
    }
}

/// Aggregate the records under an opaque query-context map (typically the
/// active filters) into a single-line English summary plus the histogram.
pub fn summarize(
    records: &[AuditRecord],
    context: &BTreeMap<String, serde_json::Value>,
) -> (String, StatusClasses) {
    let mut classes = StatusClasses::default();
    for record in records {
        if let Some(code) = record.status_code {
            classes.count(code);
        }
    }

    let qualifier = render_context(context);
    let mut summary = if records.len() == 1 {
        format!("Found 1 audit entry matching {}", qualifier)
    } else {
        format!("Found {} audit entries matching {}", records.len(), qualifier)
    };
    if !classes.is_empty() {
        summary.push_str(&format!(" ({})", classes.render()));
    }

    (summary, classes)
}

fn render_context(context: &BTreeMap<String, serde_json::Value>) -> String {
    let parts: Vec<String> = context
        .iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => format!("{}={}", key, s),
            other => format!("{}={}", key, other),
        })
        .collect();
    if parts.is_empty() {
        "the query".to_string()
    } else {
        parts.join(", ")
    }
}
