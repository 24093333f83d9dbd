//! Core types for audit queries
//!
//! Includes the query parameter record, the tracked query result, and the
//! closed set of admitted log sources.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::parser::AuditRecord;

/// Admitted audit log sources.
///
/// Each source maps to a log directory on the cluster nodes. `oc adm
/// node-logs` resolves the `--path=` argument relative to the node log root,
/// so these are relative paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogSource {
    KubeApiserver,
    OauthServer,
    OpenshiftApiserver,
    OauthApiserver,
    Node,
}

impl LogSource {
    /// All admitted sources, in catalogue order.
    pub const ALL: [LogSource; 5] = [
        LogSource::KubeApiserver,
        LogSource::OauthServer,
        LogSource::OpenshiftApiserver,
        LogSource::OauthApiserver,
        LogSource::Node,
    ];

    /// The wire name of this source (what callers pass in `log_source`).
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::KubeApiserver => "kube-apiserver",
            LogSource::OauthServer => "oauth-server",
            LogSource::OpenshiftApiserver => "openshift-apiserver",
            LogSource::OauthApiserver => "oauth-apiserver",
            LogSource::Node => "node",
        }
    }

    /// Parse a wire name. Unknown names return `None`; admission turns that
    /// into an `invalid logSource` rejection.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kube-apiserver" => Some(LogSource::KubeApiserver),
            "oauth-server" => Some(LogSource::OauthServer),
            "openshift-apiserver" => Some(LogSource::OpenshiftApiserver),
            "oauth-apiserver" => Some(LogSource::OauthApiserver),
            "node" => Some(LogSource::Node),
            _ => None,
        }
    }

    /// The log directory this source reads from. The `node` source writes
    /// under `audit/` rather than a directory named after itself.
    pub fn log_dir(&self) -> &'static str {
        match self {
            LogSource::KubeApiserver => "kube-apiserver",
            LogSource::OauthServer => "oauth-server",
            LogSource::OpenshiftApiserver => "openshift-apiserver",
            LogSource::OauthApiserver => "oauth-apiserver",
            LogSource::Node => "audit",
        }
    }

    /// Relative path of the live (currently written) audit log.
    pub fn live_log_path(&self) -> String {
        format!("{}/audit.log", self.log_dir())
    }

    /// The five admitted log directories, used by pipeline inspection.
    pub fn admitted_dirs() -> [&'static str; 5] {
        [
            "kube-apiserver",
            "oauth-server",
            "openshift-apiserver",
            "oauth-apiserver",
            "audit",
        ]
    }
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured description of what the caller wants to see in the audit logs.
///
/// Immutable after admission. Empty scalar filters mean "absent", not
/// "match empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParameters {
    /// Which audit log to read. Must be one of the admitted sources.
    pub log_source: String,

    /// Include patterns, case-insensitive. Only the first three are honoured.
    pub patterns: Vec<String>,

    /// Exclude patterns. Only the first three are honoured.
    pub exclude_patterns: Vec<String>,

    /// Human time expression ("yesterday", "last 7 days", "2h ago", ...).
    pub timeframe: String,

    /// Filter on the requesting principal.
    pub username: String,

    /// Filter on the Kubernetes resource kind.
    pub resource: String,

    /// Filter on the API verb, or a `|`-separated disjunction of verbs.
    pub verb: String,

    /// Filter on the object namespace.
    pub namespace: String,
}

impl QueryParameters {
    /// New parameters against a source, everything else unset.
    pub fn for_source(source: LogSource) -> Self {
        Self {
            log_source: source.as_str().to_string(),
            ..Default::default()
        }
    }

    /// The parsed source, if admitted.
    pub fn source(&self) -> Option<LogSource> {
        LogSource::parse(&self.log_source)
    }

    /// A scalar filter is active only when non-empty.
    pub fn has_username(&self) -> bool {
        !self.username.is_empty()
    }

    pub fn has_resource(&self) -> bool {
        !self.resource.is_empty()
    }

    pub fn has_verb(&self) -> bool {
        !self.verb.is_empty()
    }

    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }

    pub fn has_timeframe(&self) -> bool {
        !self.timeframe.is_empty()
    }

    /// Flatten the active parameters into a map for trail entries.
    pub fn to_map(&self) -> BTreeMap<String, serde_json::Value> {
        let mut map = BTreeMap::new();
        map.insert("log_source".to_string(), self.log_source.clone().into());
        if !self.patterns.is_empty() {
            map.insert("patterns".to_string(), self.patterns.clone().into());
        }
        if !self.exclude_patterns.is_empty() {
            map.insert(
                "exclude_patterns".to_string(),
                self.exclude_patterns.clone().into(),
            );
        }
        if self.has_timeframe() {
            map.insert("timeframe".to_string(), self.timeframe.clone().into());
        }
        if self.has_username() {
            map.insert("username".to_string(), self.username.clone().into());
        }
        if self.has_resource() {
            map.insert("resource".to_string(), self.resource.clone().into());
        }
        if self.has_verb() {
            map.insert("verb".to_string(), self.verb.clone().into());
        }
        if self.has_namespace() {
            map.insert("namespace".to_string(), self.namespace.clone().into());
        }
        map
    }
}

/// Unique identifier for one logical query. Cache key and trail correlation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub String);

impl QueryId {
    /// Mint a fresh identifier. UUID-backed, unique per process lifetime.
    pub fn new() -> Self {
        Self(format!("query-{}", Uuid::new_v4()))
    }
}

impl Default for QueryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QueryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The unit of caching and of reply: a tracked result for one query.
///
/// Created at generation, extended in place by the orchestrator, frozen once
/// committed to the cache. At any observation either `error` is empty and
/// `command` is non-empty, or `error` is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryResult {
    /// Identifier assigned at generation time.
    pub query_id: String,

    /// ISO-8601 generation timestamp.
    pub timestamp: String,

    /// The compiled shell pipeline, empty on generation failure.
    pub command: String,

    /// Raw combined output captured from the pipeline.
    pub raw_output: String,

    /// Typed records decoded from the raw output.
    pub records: Vec<AuditRecord>,

    /// Human-readable summary of the records.
    pub summary: String,

    /// Non-empty when any phase failed.
    pub error: String,

    /// Cumulative execution time across phases, milliseconds.
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Fresh result with an id and generation timestamp, nothing else.
    pub fn new() -> Self {
        Self {
            query_id: QueryId::new().0,
            timestamp: Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Merge a phase failure into the result without clobbering an earlier
    /// error.
    pub fn record_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        if self.error.is_empty() {
            self.error = error;
        } else {
            self.error = format!("{}; {}", self.error, error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_source_roundtrip() {
        for source in LogSource::ALL {
            assert_eq!(LogSource::parse(source.as_str()), Some(source));
        }
        assert_eq!(LogSource::parse("etcd"), None);
        assert_eq!(LogSource::parse("Kube-Apiserver"), None);
    }

    #[test]
    fn test_node_source_lives_under_audit_dir() {
        assert_eq!(LogSource::Node.live_log_path(), "audit/audit.log");
        assert_eq!(
            LogSource::KubeApiserver.live_log_path(),
            "kube-apiserver/audit.log"
        );
    }

    #[test]
    fn test_query_id_unique() {
        let a = QueryId::new();
        let b = QueryId::new();
        assert_ne!(a, b);
        assert!(a.0.starts_with("query-"));
    }

    #[test]
    fn test_record_error_merges() {
        let mut result = QueryResult::new();
        assert!(!result.has_error());
        result.record_error("first");
        result.record_error("second");
        assert_eq!(result.error, "first; second");
    }

    #[test]
    fn test_parameter_map_skips_absent_filters() {
        let params = QueryParameters {
            log_source: "kube-apiserver".to_string(),
            username: "admin".to_string(),
            ..Default::default()
        };
        let map = params.to_map();
        assert!(map.contains_key("username"));
        assert!(!map.contains_key("namespace"));
        assert!(!map.contains_key("patterns"));
    }
}
