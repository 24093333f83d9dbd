//! The three per-line decoding strategies.

use super::record::{AuditRecord, WireEvent, DECISION_ANNOTATION, REASON_ANNOTATION};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// Strict decode against the known wire schema.
pub(crate) fn parse_strict(line: &str) -> Result<AuditRecord, String> {
    let event: WireEvent = serde_json::from_str(line).map_err(|e| e.to_string())?;
    Ok(event.into_record(line))
}

/// Defensive walk over loosely-typed JSON. Absorbs shape drift the strict
/// schema rejects: string status codes, scalar users, non-string annotation
/// values. Fails unless at least one semantic field comes out.
pub(crate) fn parse_structured(line: &str) -> Result<AuditRecord, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "not a JSON object".to_string())?;

    let mut record = AuditRecord::for_line(line);

    record.timestamp = str_at(object, "requestReceivedTimestamp");
    record.verb = str_at(object, "verb");
    record.request_uri = str_at(object, "requestURI");
    record.user_agent = str_at(object, "userAgent");

    match object.get("user") {
        Some(Value::Object(user)) => {
            record.username = str_at(user, "username");
            record.user_uid = str_at(user, "uid");
            record.groups = string_list(user.get("groups"));
        }
        Some(Value::String(name)) => record.username = name.clone(),
        _ => {}
    }
    if record.username.is_empty() {
        if let Some(Value::Object(info)) = object.get("userInfo") {
            record.username = str_at(info, "username");
        }
    }

    match object.get("impersonatedUser") {
        Some(Value::Object(user)) => record.impersonated_user = str_at(user, "username"),
        Some(Value::String(name)) => record.impersonated_user = name.clone(),
        _ => {}
    }

    record.source_ips = string_list(object.get("sourceIPs"));

    if let Some(Value::Object(object_ref)) = object.get("objectRef") {
        record.resource = str_at(object_ref, "resource");
        record.namespace = str_at(object_ref, "namespace");
        record.name = str_at(object_ref, "name");
        record.api_group = str_at(object_ref, "apiGroup");
        record.api_version = str_at(object_ref, "apiVersion");
    }

    if let Some(Value::Object(status)) = object.get("responseStatus") {
        record.status_code = lenient_code(status.get("code"));
        record.status_message = str_at(status, "message");
        record.status_reason = str_at(status, "reason");
    }

    if let Some(Value::Object(annotations)) = object.get("annotations") {
        let mut map = BTreeMap::new();
        for (key, value) in annotations {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            map.insert(key.clone(), text);
        }
        record.auth_decision = map.get(DECISION_ANNOTATION).cloned().unwrap_or_default();
        record.auth_reason = map.get(REASON_ANNOTATION).cloned().unwrap_or_default();
        record.annotations = map;
    }

    const KNOWN: &[&str] = &[
        "requestReceivedTimestamp",
        "verb",
        "requestURI",
        "userAgent",
        "user",
        "userInfo",
        "impersonatedUser",
        "sourceIPs",
        "objectRef",
        "responseStatus",
        "annotations",
    ];
    for (key, value) in object {
        if !KNOWN.contains(&key.as_str()) {
            record.extra.insert(key.clone(), value.clone());
        }
    }

    if record.has_content() {
        Ok(record)
    } else {
        Err("no recognisable audit fields".to_string())
    }
}

fn str_at(object: &serde_json::Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// A status code may arrive as a number, a numeric string, or a float.
fn lenient_code(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Last-resort extraction from raw text: JSON fragments by pattern, plus the
/// `key: value | key: value` lines the jq output formatter emits.
#[derive(Debug)]
pub(crate) struct GrepExtractor {
    timestamp: Regex,
    username: Regex,
    verb: Regex,
    resource: Regex,
    namespace: Regex,
    name: Regex,
    code: Regex,
    request_uri: Regex,
    user_agent: Regex,
}

impl GrepExtractor {
    pub(crate) fn new() -> Self {
        Self {
            timestamp: Regex::new(r#""requestReceivedTimestamp":"([^"]*)""#).unwrap(),
            username: Regex::new(r#""username":"([^"]*)""#).unwrap(),
            verb: Regex::new(r#""verb":"([^"]*)""#).unwrap(),
            resource: Regex::new(r#""resource":"([^"]*)""#).unwrap(),
            namespace: Regex::new(r#""namespace":"([^"]*)""#).unwrap(),
            name: Regex::new(r#""name":"([^"]*)""#).unwrap(),
            code: Regex::new(r#""code":\s*(\d+)"#).unwrap(),
            request_uri: Regex::new(r#""requestURI":"([^"]*)""#).unwrap(),
            user_agent: Regex::new(r#""userAgent":"([^"]*)""#).unwrap(),
        }
    }

    pub(crate) fn parse(&self, line: &str) -> Result<AuditRecord, String> {
        let record = if looks_formatted(line) {
            self.parse_formatted(line)
        } else {
            self.parse_fragments(line)
        };

        if record.has_content() {
            Ok(record)
        } else {
            Err("no extractable fields".to_string())
        }
    }

    fn parse_fragments(&self, line: &str) -> AuditRecord {
        let mut record = AuditRecord::for_line(line);
        record.timestamp = capture(&self.timestamp, line);
        record.username = capture(&self.username, line);
        record.verb = capture(&self.verb, line);
        record.resource = capture(&self.resource, line);
        record.namespace = capture(&self.namespace, line);
        record.name = capture(&self.name, line);
        record.request_uri = capture(&self.request_uri, line);
        record.user_agent = capture(&self.user_agent, line);
        record.status_code = self
            .code
            .captures(line)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
        record
    }

    fn parse_formatted(&self, line: &str) -> AuditRecord {
        let mut record = AuditRecord::for_line(line);
        for pair in line.split(" | ") {
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "timestamp" => record.timestamp = value.to_string(),
                "username" => {
                    if value != "unknown" {
                        record.username = value.to_string();
                    }
                }
                "verb" => record.verb = value.to_string(),
                "resource" => record.resource = value.to_string(),
                "namespace" => record.namespace = value.to_string(),
                "name" => record.name = value.to_string(),
                "statusCode" => record.status_code = value.parse().ok(),
                "statusMessage" => record.status_message = value.to_string(),
                "requestURI" => record.request_uri = value.to_string(),
                "userAgent" => record.user_agent = value.to_string(),
                "sourceIPs" => {
                    record.source_ips = value
                        .split(',')
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                _ => {}
            }
        }
        record
    }
}

/// The jq formatter always leads with a timestamp pair.
fn looks_formatted(line: &str) -> bool {
    line.starts_with("timestamp:") && line.contains(" | ")
}

fn capture(regex: &Regex, line: &str) -> String {
    regex
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
