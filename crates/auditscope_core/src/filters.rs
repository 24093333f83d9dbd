//! Field-Filter Builder - Per-Field Match Stages
//!
//! Turns query parameters into pipeline stages appended after the base CLI
//! invocation. Two modes exist:
//!
//! - **Grep mode** (default): a chain of `grep` stages. Field filters
//!   enumerate the JSON-structural shapes each field is known to appear in,
//!   which makes them sensitive to emitter key ordering; that is tolerated.
//! - **JSON-aware mode**: a single `jq` program with a `select(...)`
//!   conjunction, a time gate on `requestReceivedTimestamp`, and a key-value
//!   output formatter. The authoritative path where jq is available.
//!
//! Include and exclude lists are bounded: only the first three of each are
//! honoured.

use crate::timeframe::TimeWindow;
use crate::types::QueryParameters;

/// How field filters are expressed in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Chain of grep stages over raw JSON lines.
    #[default]
    Grep,
    /// Single jq program with select conjunction and formatter.
    JsonAware,
}

/// Cap on honoured include patterns.
pub const MAX_PATTERNS: usize = 3;
/// Cap on honoured exclude patterns.
pub const MAX_EXCLUDES: usize = 3;
/// Widest window the grep-mode time gate will enumerate day prefixes for.
const MAX_GATE_DAYS: usize = 31;

/// Builds filter stages for one query.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterBuilder {
    mode: FilterMode,
}

impl FilterBuilder {
    pub fn new(mode: FilterMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Produce the pipeline stages (without the leading base command).
    pub fn build(&self, params: &QueryParameters, window: Option<&TimeWindow>) -> Vec<String> {
        match self.mode {
            FilterMode::Grep => self.build_grep(params, window),
            FilterMode::JsonAware => vec![self.build_jq(params, window)],
        }
    }

    fn build_grep(&self, params: &QueryParameters, window: Option<&TimeWindow>) -> Vec<String> {
        let mut stages = Vec::new();

        let includes: Vec<&String> = params.patterns.iter().take(MAX_PATTERNS).collect();
        if !includes.is_empty() {
            let alternation = includes
                .iter()
                .map(|p| regex::escape(p))
                .collect::<Vec<_>>()
                .join("|");
            stages.push(format!("grep -iE {}", shell_quote(&alternation)));
        }

        for exclude in params.exclude_patterns.iter().take(MAX_EXCLUDES) {
            stages.push(format!("grep -v {}", shell_quote(exclude)));
        }

        if params.has_username() {
            let shapes = username_shapes(&params.username);
            stages.push(format!("grep -E {}", shell_quote(&shapes.join("|"))));
        }

        if params.has_resource() {
            let shapes = resource_shapes(&params.resource);
            stages.push(format!("grep -E {}", shell_quote(&shapes.join("|"))));
        }

        if params.has_verb() {
            stages.push(format!("grep -E {}", shell_quote(&verb_shape(&params.verb))));
        }

        if params.has_namespace() {
            let shapes = namespace_shapes(&params.namespace);
            stages.push(format!("grep -E {}", shell_quote(&shapes.join("|"))));
        }

        if let Some(gate) = window.and_then(grep_time_gate) {
            stages.push(gate);
        }

        stages
    }

    fn build_jq(&self, params: &QueryParameters, window: Option<&TimeWindow>) -> String {
        let mut conjuncts = Vec::new();

        if params.has_username() {
            conjuncts.push(format!(
                "(.user.username // \\\"\\\" | contains(\\\"{}\\\"))",
                jq_escape(&params.username)
            ));
        }
        if params.has_resource() {
            conjuncts.push(format!(
                "((.objectRef.resource // \\\"\\\") == \\\"{}\\\")",
                jq_escape(&params.resource)
            ));
        }
        if params.has_verb() {
            let alternatives = params
                .verb
                .split('|')
                .map(|v| format!(". == \\\"{}\\\"", jq_escape(v)))
                .collect::<Vec<_>>()
                .join(" or ");
            conjuncts.push(format!("(.verb // \\\"\\\" | {})", alternatives));
        }
        if params.has_namespace() {
            conjuncts.push(format!(
                "((.objectRef.namespace // \\\"\\\") == \\\"{}\\\")",
                jq_escape(&params.namespace)
            ));
        }
        for pattern in params.patterns.iter().take(MAX_PATTERNS) {
            conjuncts.push(format!(
                "(tostring | ascii_downcase | contains(\\\"{}\\\"))",
                jq_escape(&pattern.to_lowercase())
            ));
        }
        for exclude in params.exclude_patterns.iter().take(MAX_EXCLUDES) {
            conjuncts.push(format!(
                "(tostring | contains(\\\"{}\\\") | not)",
                jq_escape(exclude)
            ));
        }
        if let Some(window) = window {
            // Epoch floor computed in-pipeline by the whitelisted date
            // substitution; the timestamp is truncated to whole seconds
            // before fromdateiso8601 so fractional precision cannot break
            // the comparison.
            let floor = window.0.format("%Y-%m-%d %H:%M:%S");
            conjuncts.push(format!(
                "((.requestReceivedTimestamp // \\\"\\\" | .[0:19] + \\\"Z\\\" | fromdateiso8601? // 0) >= $(date -d '{}' +%s))",
                floor
            ));
        }

        let selector = if conjuncts.is_empty() {
            "select(true)".to_string()
        } else {
            format!("select({})", conjuncts.join(" and "))
        };

        format!("jq -r \"{} | {}\"", selector, jq_formatter())
    }
}

/// The key-value line formatter emitted by JSON-aware mode.
fn jq_formatter() -> &'static str {
    "\\\"timestamp: \\(.requestReceivedTimestamp // \\\"\\\") | \
username: \\(.user.username // \\\"unknown\\\") | \
verb: \\(.verb // \\\"\\\") | \
resource: \\(.objectRef.resource // \\\"\\\") | \
namespace: \\(.objectRef.namespace // \\\"\\\") | \
name: \\(.objectRef.name // \\\"\\\") | \
statusCode: \\(.responseStatus.code // 0) | \
statusMessage: \\(.responseStatus.message // \\\"\\\") | \
requestURI: \\(.requestURI // \\\"\\\") | \
userAgent: \\(.userAgent // \\\"\\\") | \
sourceIPs: \\(.sourceIPs // [] | join(\\\",\\\"))\\\""
}

/// JSON-structural positions a username is known to appear in. Ten shapes,
/// ordered from the common apiserver layout to the exotic ones.
fn username_shapes(username: &str) -> Vec<String> {
    let u = regex::escape(username);
    vec![
        format!("\"user\":\\{{\"username\":\"{}\"", u),
        format!("\"user\":\"{}\"", u),
        format!("\"userInfo\":\\{{\"username\":\"{}\"", u),
        format!("\"impersonatedUser\":\\{{\"username\":\"{}\"", u),
        format!("\"requestUser\":\"{}\"", u),
        format!("\"annotations\":\\{{[^}}]*\"{}\"", u),
        format!("\"oauth\\.openshift\\.io/username\":\"{}\"", u),
        format!("\"authentication\\.k8s\\.io/username\":\"{}\"", u),
        format!("\"userAgent\":\"[^\"]*{}", u),
        format!("\"requestHeaders\":\\{{[^}}]*\"{}\"", u),
    ]
}

fn resource_shapes(resource: &str) -> Vec<String> {
    let r = regex::escape(resource);
    vec![
        format!("\"resource\":\"{}\"", r),
        format!("\"objectRef\":\\{{\"resource\":\"{}\"", r),
        format!("\"requestURI\":\"[^\"]*/{}[/?\"]", r),
    ]
}

fn verb_shape(verb: &str) -> String {
    let parts: Vec<String> = verb.split('|').map(|v| regex::escape(v)).collect();
    if parts.len() == 1 {
        format!("\"verb\":\"{}\"", parts[0])
    } else {
        format!("\"verb\":\"({})\"", parts.join("|"))
    }
}

fn namespace_shapes(namespace: &str) -> Vec<String> {
    let ns = regex::escape(namespace);
    vec![
        format!("\"namespace\":\"{}\"", ns),
        format!("\"requestURI\":\"[^\"]*/namespaces/{}[/?\"]", ns),
    ]
}

/// Grep-mode time gate: match timestamp prefixes for every day in the
/// window. Skipped when the window is too wide to enumerate.
fn grep_time_gate(window: &TimeWindow) -> Option<String> {
    let days = crate::planner::days_in_window(window);
    if days.is_empty() || days.len() > MAX_GATE_DAYS {
        return None;
    }
    let prefixes = days
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect::<Vec<_>>()
        .join("|");
    Some(format!(
        "grep -E {}",
        shell_quote(&format!("\"requestReceivedTimestamp\":\"({})", prefixes))
    ))
}

/// Wrap a string in single quotes for safe embedding in a shell pipeline.
/// Embedded single quotes become the `'\''` splice.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Escape for embedding inside a jq double-quoted string literal.
fn jq_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
