//! Validator - Parameter Admission and Pipeline Inspection
//!
//! Two phases guard the executor. Phase (a) admits or rejects the query
//! parameters field by field against closed whitelists. Phase (b) inspects
//! the compiled shell string: rather than substring bans alone, it walks the
//! pipeline with a small shell-grammar recogniser (quote-aware, substitution
//! aware), splits it into sub-pipelines and stages, and checks every command
//! word against a closed set. A phase (b) failure is fatal to the request;
//! the executor is never invoked.

use crate::compiler::BASE_COMMAND;
use crate::timeframe::TimeframeResolver;
use crate::types::{LogSource, QueryParameters};
use regex::Regex;
use thiserror::Error;

/// Admission and inspection failures.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Phase (a): a field failed admission.
    #[error("invalid {field}: {value}")]
    InvalidParameter { field: &'static str, value: String },

    /// Phase (b): the compiled pipeline contains a construct that is not
    /// whitelisted. Fatal; never executed.
    #[error("unsafe command: {0}")]
    UnsafeCommand(String),
}

/// Kubernetes and OpenShift resource kinds the resource filter admits.
pub const ADMITTED_RESOURCES: &[&str] = &[
    "pods",
    "deployments",
    "replicasets",
    "statefulsets",
    "daemonsets",
    "services",
    "endpoints",
    "configmaps",
    "secrets",
    "namespaces",
    "nodes",
    "persistentvolumes",
    "persistentvolumeclaims",
    "serviceaccounts",
    "roles",
    "rolebindings",
    "clusterroles",
    "clusterrolebindings",
    "customresourcedefinitions",
    "events",
    "jobs",
    "cronjobs",
    "ingresses",
    "networkpolicies",
    "leases",
    "routes",
    "projects",
    "builds",
    "buildconfigs",
    "deploymentconfigs",
    "imagestreams",
    "machines",
    "machinesets",
    "machineconfigs",
    "oauthaccesstokens",
    "oauthclients",
    "subjectaccessreviews",
    "tokenreviews",
];

/// API verbs the verb filter admits, singly or as a `|` disjunction.
pub const ADMITTED_VERBS: &[&str] = &[
    "get",
    "list",
    "watch",
    "create",
    "update",
    "patch",
    "delete",
    "deletecollection",
    "impersonate",
];

/// Commands a pipeline stage may start with. `oc` is further constrained to
/// the exact base invocation.
const ALLOWED_STAGE_COMMANDS: &[&str] = &[
    "oc", "grep", "jq", "head", "tail", "wc", "sort", "uniq", "cut", "zcat", "bzcat",
];

/// Destructive or write-capable fragments that must never appear in the
/// unquoted text of a pipeline. The structural stage check subsumes most of
/// these; the list stays as a second, independent trip-wire.
const DISALLOWED_TOKENS: &[&str] = &[
    "oc delete",
    "oc apply",
    "oc create",
    "oc patch",
    "oc replace",
    "oc edit",
    "oc exec",
    "oc debug",
    "oc scale",
    "kubectl ",
    "rm ",
    "mv ",
    "dd ",
    "mkfs",
    "shutdown",
    "reboot",
    "sudo ",
    "chmod ",
    "chown ",
    "kill ",
    "curl ",
    "wget ",
    "ssh ",
    "scp ",
    "eval ",
];

/// Validates parameters and compiled pipelines.
#[derive(Debug)]
pub struct Validator {
    resolver: TimeframeResolver,
    username_shapes: Vec<Regex>,
    namespace: Regex,
    date_substitution: Regex,
}

impl Validator {
    pub fn new() -> Self {
        let username_shapes = vec![
            // Exact well-known principals
            Regex::new(r"^(system:admin|kube:admin|system:anonymous|system:unauthenticated)$")
                .unwrap(),
            // Service accounts: system:serviceaccount:<ns>:<sa>
            Regex::new(r"^system:serviceaccount:[a-z0-9]([a-z0-9-]*[a-z0-9])?:[a-z0-9]([a-z0-9.-]*[a-z0-9])?$")
                .unwrap(),
            // Nodes: system:node:<name>
            Regex::new(r"^system:node:[A-Za-z0-9]([A-Za-z0-9.-]*[A-Za-z0-9])?$").unwrap(),
            // Plain identifier
            Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap(),
            // Email address
            Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap(),
            // DOMAIN\user
            Regex::new(r"^[A-Za-z0-9.-]+\\[A-Za-z0-9._-]+$").unwrap(),
            // Provider principals: idp/user, idp:user, idp/uid=user
            Regex::new(r"^[A-Za-z0-9._-]+[/:][A-Za-z0-9@._:/=-]+$").unwrap(),
        ];

        Self {
            resolver: TimeframeResolver::new(),
            username_shapes,
            namespace: Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").unwrap(),
            // The only command substitution a pipeline may carry: read-only
            // date formatting for the in-pipeline time gate.
            date_substitution: Regex::new(r"^date( -d '[^']*')? \+%s$").unwrap(),
        }
    }

    // ------------------------------------------------------------------
    // Phase (a): parameter admission
    // ------------------------------------------------------------------

    pub fn admit(&self, params: &QueryParameters) -> Result<(), ValidationError> {
        if LogSource::parse(&params.log_source).is_none() {
            return Err(invalid("log_source", &params.log_source));
        }

        if params.has_timeframe() && !self.resolver.recognises(&params.timeframe) {
            return Err(invalid("timeframe", &params.timeframe));
        }

        if params.has_resource() && !ADMITTED_RESOURCES.contains(&params.resource.as_str()) {
            return Err(invalid("resource", &params.resource));
        }

        if params.has_verb() {
            let ok = params
                .verb
                .split('|')
                .all(|v| !v.is_empty() && ADMITTED_VERBS.contains(&v));
            if !ok {
                return Err(invalid("verb", &params.verb));
            }
        }

        if params.has_namespace() && !self.namespace.is_match(&params.namespace) {
            return Err(invalid("namespace", &params.namespace));
        }

        if params.has_username()
            && !self
                .username_shapes
                .iter()
                .any(|shape| shape.is_match(&params.username))
        {
            return Err(invalid("username", &params.username));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase (b): compiled-pipeline inspection
    // ------------------------------------------------------------------

    pub fn inspect_pipeline(&self, command: &str) -> Result<(), ValidationError> {
        let trimmed = command.trim();

        let (body, grouped) = if let Some(stripped) = trimmed.strip_prefix('(') {
            let inner = stripped
                .strip_suffix(')')
                .ok_or_else(|| unsafe_cmd("unterminated command group"))?;
            (inner, true)
        } else {
            (trimmed, false)
        };

        if !body.trim_start().starts_with(BASE_COMMAND) {
            return Err(unsafe_cmd(format!(
                "pipeline must start with '{}'",
                BASE_COMMAND
            )));
        }

        let segments = split_chain(body).map_err(unsafe_cmd)?;
        if segments.is_empty() {
            return Err(unsafe_cmd("empty pipeline"));
        }
        let chained = grouped || segments.len() > 1;

        for segment in &segments {
            self.inspect_segment(segment, chained)?;
        }

        Ok(())
    }

    /// Check one sub-pipeline: base command, role, admitted paths, stage
    /// command words, substitutions and the disallowed-token list.
    fn inspect_segment(&self, segment: &str, chained: bool) -> Result<(), ValidationError> {
        let segment = segment.trim();
        if !segment.starts_with(BASE_COMMAND) {
            return Err(unsafe_cmd(format!(
                "chained pipeline must start with '{}': {}",
                BASE_COMMAND, segment
            )));
        }

        let scan = scan_segment(segment).map_err(unsafe_cmd)?;

        if chained && !scan.unquoted.contains("--role=master") {
            return Err(unsafe_cmd(format!("missing --role=master: {}", segment)));
        }

        self.check_paths(&scan.unquoted, segment)?;

        let lowered = scan.unquoted.to_lowercase();
        for token in DISALLOWED_TOKENS {
            if lowered.contains(token) {
                return Err(unsafe_cmd(format!("disallowed token '{}'", token.trim())));
            }
        }

        for substitution in &scan.substitutions {
            if !self.date_substitution.is_match(substitution.trim()) {
                return Err(unsafe_cmd(format!(
                    "disallowed command substitution '$({})'",
                    substitution
                )));
            }
        }

        for stage in &scan.stages {
            let stage = stage.trim();
            let word = stage.split_whitespace().next().unwrap_or_default();
            if !ALLOWED_STAGE_COMMANDS.contains(&word) {
                return Err(unsafe_cmd(format!("disallowed stage command '{}'", word)));
            }
            if word == "oc" && !stage.starts_with(BASE_COMMAND) {
                return Err(unsafe_cmd(format!("oc may only appear as '{}'", BASE_COMMAND)));
            }
        }

        Ok(())
    }

    /// Every `--path=` argument must name a file under one of the five
    /// admitted log directories, and at least one target must exist.
    fn check_paths(&self, unquoted: &str, segment: &str) -> Result<(), ValidationError> {
        let mut found = false;
        for word in unquoted.split_whitespace() {
            if let Some(path) = word.strip_prefix("--path=") {
                found = true;
                let admitted = LogSource::admitted_dirs()
                    .iter()
                    .any(|dir| path.starts_with(&format!("{}/", dir)));
                if !admitted {
                    return Err(unsafe_cmd(format!("path outside admitted directories: {}", path)));
                }
            }
        }
        if !found {
            return Err(unsafe_cmd(format!("no --path target: {}", segment)));
        }
        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid(field: &'static str, value: &str) -> ValidationError {
    ValidationError::InvalidParameter {
        field,
        value: value.to_string(),
    }
}

fn unsafe_cmd(msg: impl Into<String>) -> ValidationError {
    ValidationError::UnsafeCommand(msg.into())
}

// ----------------------------------------------------------------------
// Shell-grammar recogniser
// ----------------------------------------------------------------------

/// What the quote-aware scan of one sub-pipeline produced.
struct SegmentScan {
    /// Pipe-separated stages, raw text.
    stages: Vec<String>,
    /// Inner text of every `$(...)` substitution.
    substitutions: Vec<String>,
    /// The segment with quoted spans blanked out, for token scans.
    unquoted: String,
}

/// Split a chain body on top-level `&&` and `;`, honouring quoting and
/// command substitution. A bare `&` or unbalanced quote is an error.
fn split_chain(body: &str) -> Result<Vec<String>, String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = body.chars().collect();
    let mut i = 0;
    let mut state = QuoteState::Normal;

    while i < chars.len() {
        let ch = chars[i];
        match state {
            QuoteState::Normal => match ch {
                '\'' => {
                    state = QuoteState::Single;
                    current.push(ch);
                }
                '"' => {
                    state = QuoteState::Double;
                    current.push(ch);
                }
                '$' if chars.get(i + 1) == Some(&'(') => {
                    let (raw, next) = consume_substitution(&chars, i)?;
                    current.push_str(&raw);
                    i = next;
                    continue;
                }
                '&' if chars.get(i + 1) == Some(&'&') => {
                    segments.push(current.trim().to_string());
                    current = String::new();
                    i += 2;
                    continue;
                }
                '&' => return Err("bare '&' is not allowed".to_string()),
                ';' => {
                    segments.push(current.trim().to_string());
                    current = String::new();
                }
                _ => current.push(ch),
            },
            QuoteState::Single => {
                current.push(ch);
                if ch == '\'' {
                    state = QuoteState::Normal;
                }
            }
            QuoteState::Double => {
                if ch == '\\' && i + 1 < chars.len() {
                    current.push(ch);
                    current.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if ch == '$' && chars.get(i + 1) == Some(&'(') {
                    let (raw, next) = consume_substitution(&chars, i)?;
                    current.push_str(&raw);
                    i = next;
                    continue;
                }
                current.push(ch);
                if ch == '"' {
                    state = QuoteState::Normal;
                }
            }
        }
        i += 1;
    }

    if state != QuoteState::Normal {
        return Err("unterminated quote".to_string());
    }

    let tail = current.trim();
    if !tail.is_empty() {
        segments.push(tail.to_string());
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err("empty chained command".to_string());
    }
    Ok(segments)
}

/// Scan one sub-pipeline into stages, substitutions and unquoted text.
fn scan_segment(segment: &str) -> Result<SegmentScan, String> {
    let mut stages = Vec::new();
    let mut substitutions = Vec::new();
    let mut unquoted = String::new();
    let mut current = String::new();
    let chars: Vec<char> = segment.chars().collect();
    let mut i = 0;
    let mut state = QuoteState::Normal;

    while i < chars.len() {
        let ch = chars[i];
        match state {
            QuoteState::Normal => match ch {
                '\'' => {
                    state = QuoteState::Single;
                    current.push(ch);
                }
                '"' => {
                    state = QuoteState::Double;
                    current.push(ch);
                }
                '`' => return Err("backtick substitution is not allowed".to_string()),
                '>' | '<' => return Err(format!("redirection '{}' is not allowed", ch)),
                '(' | ')' => return Err("unexpected parenthesis".to_string()),
                '$' if chars.get(i + 1) == Some(&'(') => {
                    let (raw, next) = consume_substitution(&chars, i)?;
                    substitutions.push(raw[2..raw.len() - 1].to_string());
                    current.push_str(&raw);
                    i = next;
                    continue;
                }
                '|' if chars.get(i + 1) == Some(&'|') => {
                    return Err("'||' is not allowed".to_string());
                }
                '|' => {
                    stages.push(current.clone());
                    current = String::new();
                }
                _ => {
                    current.push(ch);
                    unquoted.push(ch);
                }
            },
            QuoteState::Single => {
                current.push(ch);
                if ch == '\'' {
                    state = QuoteState::Normal;
                }
            }
            QuoteState::Double => {
                if ch == '\\' && i + 1 < chars.len() {
                    current.push(ch);
                    current.push(chars[i + 1]);
                    i += 2;
                    continue;
                }
                if ch == '`' {
                    return Err("backtick substitution is not allowed".to_string());
                }
                if ch == '$' && chars.get(i + 1) == Some(&'(') {
                    let (raw, next) = consume_substitution(&chars, i)?;
                    substitutions.push(raw[2..raw.len() - 1].to_string());
                    current.push_str(&raw);
                    i = next;
                    continue;
                }
                current.push(ch);
                if ch == '"' {
                    state = QuoteState::Normal;
                }
            }
        }
        i += 1;
    }

    if state != QuoteState::Normal {
        return Err("unterminated quote".to_string());
    }
    stages.push(current);
    if stages.iter().any(|s| s.trim().is_empty()) {
        return Err("empty pipeline stage".to_string());
    }

    Ok(SegmentScan {
        stages,
        substitutions,
        unquoted,
    })
}

/// Consume a `$( ... )` span starting at `start` (pointing at `$`).
/// Returns the raw span text and the index one past the closing paren.
fn consume_substitution(chars: &[char], start: usize) -> Result<(String, usize), String> {
    let mut depth = 0usize;
    let mut raw = String::new();
    let mut i = start;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let ch = chars[i];
        raw.push(ch);
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok((raw, i + 1));
                    }
                }
                '`' => return Err("backtick inside substitution".to_string()),
                _ => {}
            },
        }
        i += 1;
    }
    Err("unterminated command substitution".to_string())
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum QuoteState {
    Normal,
    Single,
    Double,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new()
    }

    fn base_params() -> QueryParameters {
        QueryParameters {
            log_source: "kube-apiserver".to_string(),
            ..Default::default()
        }
    }

    // -- phase (a) ------------------------------------------------------

    #[test]
    fn test_admits_minimal_parameters() {
        assert!(validator().admit(&base_params()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_source() {
        let mut p = base_params();
        p.log_source = "etcd".to_string();
        let err = validator().admit(&p).unwrap_err();
        assert_eq!(err.to_string(), "invalid log_source: etcd");
    }

    #[test]
    fn test_timeframe_grammar_admission() {
        let mut p = base_params();
        p.timeframe = "last 7 days".to_string();
        assert!(validator().admit(&p).is_ok());

        // Structurally well-formed but unresolvable still admits; the
        // planner falls back to the live file.
        p.timeframe = "since 2023-13-45".to_string();
        assert!(validator().admit(&p).is_ok());

        p.timeframe = "whenever".to_string();
        assert!(validator().admit(&p).is_err());
    }

    #[test]
    fn test_resource_whitelist() {
        let mut p = base_params();
        p.resource = "pods".to_string();
        assert!(validator().admit(&p).is_ok());

        p.resource = "widgets".to_string();
        let err = validator().admit(&p).unwrap_err();
        assert_eq!(err.to_string(), "invalid resource: widgets");
    }

    #[test]
    fn test_verb_disjunction() {
        let mut p = base_params();
        p.verb = "get|list|watch".to_string();
        assert!(validator().admit(&p).is_ok());

        p.verb = "get|drop".to_string();
        assert!(validator().admit(&p).is_err());

        p.verb = "get|".to_string();
        assert!(validator().admit(&p).is_err());
    }

    #[test]
    fn test_namespace_dns_label() {
        let mut p = base_params();
        for ns in ["default", "kube-system", "a", "a1-b2"] {
            p.namespace = ns.to_string();
            assert!(validator().admit(&p).is_ok(), "rejected {:?}", ns);
        }
        for ns in ["-leading", "trailing-", "UPPER", "under_score", ""] {
            p.namespace = ns.to_string();
            if ns.is_empty() {
                // empty means absent
                assert!(validator().admit(&p).is_ok());
            } else {
                assert!(validator().admit(&p).is_err(), "accepted {:?}", ns);
            }
        }
        p.namespace = "x".repeat(64);
        assert!(validator().admit(&p).is_err());
    }

    #[test]
    fn test_username_principal_shapes() {
        let mut p = base_params();
        for user in [
            "admin",
            "jane.doe",
            "jane@example.com",
            "system:admin",
            "kube:admin",
            "system:anonymous",
            "system:unauthenticated",
            "system:serviceaccount:kube-system:deployment-controller",
            "system:node:worker-0.example.com",
            "CORP\\jdoe",
            "ldap/uid=jdoe",
            "oidc:jane",
        ] {
            p.username = user.to_string();
            assert!(validator().admit(&p).is_ok(), "rejected {:?}", user);
        }
        for user in ["has space", "semi;colon", "back`tick", "$(whoami)"] {
            p.username = user.to_string();
            assert!(validator().admit(&p).is_err(), "accepted {:?}", user);
        }
    }

    // -- phase (b) ------------------------------------------------------

    #[test]
    fn test_rejects_non_node_logs_command() {
        let err = validator()
            .inspect_pipeline("oc delete pod --all")
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnsafeCommand(_)));
    }

    #[test]
    fn test_accepts_simple_pipeline_with_head() {
        validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=kube-apiserver/audit.log | head -10",
            )
            .unwrap();
    }

    #[test]
    fn test_accepts_grep_chain() {
        validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=oauth-server/audit.log \
                 | grep -iE 'pods|delete' | grep -v 'system:' | wc -l",
            )
            .unwrap();
    }

    #[test]
    fn test_rejects_path_outside_admitted_dirs() {
        let err = validator()
            .inspect_pipeline("oc adm node-logs --role=master --path=etc/shadow")
            .unwrap_err();
        assert!(err.to_string().contains("admitted directories"));
    }

    #[test]
    fn test_rejects_missing_path() {
        assert!(validator()
            .inspect_pipeline("oc adm node-logs --role=master")
            .is_err());
    }

    #[test]
    fn test_rejects_backticks_and_redirection() {
        let v = validator();
        assert!(v
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=audit/audit.log | grep `whoami`"
            )
            .is_err());
        assert!(v
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=audit/audit.log > /tmp/out"
            )
            .is_err());
    }

    #[test]
    fn test_rejects_foreign_command_substitution() {
        let err = validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=audit/audit.log | grep $(whoami)",
            )
            .unwrap_err();
        assert!(err.to_string().contains("command substitution"));
    }

    #[test]
    fn test_accepts_whitelisted_date_substitution() {
        validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=kube-apiserver/audit.log \
                 | jq -r \"select((.requestReceivedTimestamp // \\\"\\\" | .[0:19] + \\\"Z\\\" \
                 | fromdateiso8601? // 0) >= $(date -d '2024-03-14 00:00:00' +%s))\"",
            )
            .unwrap();
    }

    #[test]
    fn test_rejects_disallowed_stage_command() {
        let err = validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=audit/audit.log | xargs rm",
            )
            .unwrap_err();
        assert!(err.to_string().contains("xargs"));
    }

    #[test]
    fn test_chain_requires_role_and_base_per_segment() {
        let v = validator();

        v.inspect_pipeline(
            "(oc adm node-logs --role=master --path=kube-apiserver/audit.log \
             && oc adm node-logs --role=master --path=kube-apiserver/audit.log.1)",
        )
        .unwrap();

        // Second segment without --role=master
        assert!(v
            .inspect_pipeline(
                "(oc adm node-logs --role=master --path=kube-apiserver/audit.log \
                 && oc adm node-logs --path=kube-apiserver/audit.log.1)",
            )
            .is_err());

        // Second segment is not the base command at all
        assert!(v
            .inspect_pipeline(
                "(oc adm node-logs --role=master --path=kube-apiserver/audit.log && rm -rf /)",
            )
            .is_err());
    }

    #[test]
    fn test_semicolon_chain_checked_per_segment() {
        assert!(validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=audit/audit.log; reboot"
            )
            .is_err());
    }

    #[test]
    fn test_pipe_symbols_inside_quotes_are_opaque() {
        // The '|' inside the grep pattern is data, not a stage separator.
        validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=audit/audit.log | grep -E '\"verb\":\"(get|list)\"'",
            )
            .unwrap();
    }

    #[test]
    fn test_or_list_rejected() {
        assert!(validator()
            .inspect_pipeline(
                "oc adm node-logs --role=master --path=audit/audit.log || true"
            )
            .is_err());
    }

    #[test]
    fn test_compiled_output_passes_inspection() {
        use crate::compiler::PipelineCompiler;
        use chrono::{Local, TimeZone};

        let v = validator();
        let now = Local.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let compiler = PipelineCompiler::default();

        let cases = [
            QueryParameters {
                log_source: "kube-apiserver".to_string(),
                patterns: vec!["pods".to_string()],
                exclude_patterns: vec!["system:".to_string()],
                username: "admin".to_string(),
                ..Default::default()
            },
            QueryParameters {
                log_source: "node".to_string(),
                timeframe: "yesterday".to_string(),
                verb: "get|list".to_string(),
                ..Default::default()
            },
            QueryParameters {
                log_source: "oauth-apiserver".to_string(),
                timeframe: "last 7 days".to_string(),
                namespace: "openshift-authentication".to_string(),
                ..Default::default()
            },
        ];

        for params in cases {
            let command = compiler.compile_at(&params, now).unwrap();
            v.inspect_pipeline(&command)
                .unwrap_or_else(|e| panic!("rejected own output: {} for {}", e, command));
        }
    }
}
