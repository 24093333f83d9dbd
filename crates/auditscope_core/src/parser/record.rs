//! Typed audit records and the wire schema they decode from.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Annotation key carrying the authorization decision.
pub const DECISION_ANNOTATION: &str = "authorization.k8s.io/decision";
/// Annotation key carrying the authorization reason.
pub const REASON_ANNOTATION: &str = "authorization.k8s.io/reason";

/// One decoded audit event.
///
/// `raw_line` is always populated, whatever strategy decoded the line. When
/// JSON decoding failed but a fallback succeeded, `parse_errors` records the
/// earlier failures and at least one semantic field is populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditRecord {
    /// `requestReceivedTimestamp` from the event.
    pub timestamp: String,
    pub username: String,
    pub user_uid: String,
    pub groups: Vec<String>,
    pub verb: String,
    pub resource: String,
    pub namespace: String,
    pub name: String,
    pub api_group: String,
    pub api_version: String,
    pub request_uri: String,
    pub user_agent: String,
    pub source_ips: Vec<String>,
    pub status_code: Option<i64>,
    pub status_message: String,
    pub status_reason: String,
    /// `authorization.k8s.io/decision`, when annotated.
    pub auth_decision: String,
    /// `authorization.k8s.io/reason`, when annotated.
    pub auth_reason: String,
    pub impersonated_user: String,
    pub annotations: BTreeMap<String, String>,
    /// Top-level keys the schema does not know about.
    pub extra: BTreeMap<String, Value>,
    /// The original input line, verbatim.
    pub raw_line: String,
    /// Failures of earlier strategies on this line.
    pub parse_errors: Vec<String>,
    /// Moment of parse, RFC 3339.
    pub parsed_at: String,
}

/// Equality is semantic: two decodes of the same line are equal even though
/// their parse moments differ.
impl PartialEq for AuditRecord {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.username == other.username
            && self.user_uid == other.user_uid
            && self.groups == other.groups
            && self.verb == other.verb
            && self.resource == other.resource
            && self.namespace == other.namespace
            && self.name == other.name
            && self.api_group == other.api_group
            && self.api_version == other.api_version
            && self.request_uri == other.request_uri
            && self.user_agent == other.user_agent
            && self.source_ips == other.source_ips
            && self.status_code == other.status_code
            && self.status_message == other.status_message
            && self.status_reason == other.status_reason
            && self.auth_decision == other.auth_decision
            && self.auth_reason == other.auth_reason
            && self.impersonated_user == other.impersonated_user
            && self.annotations == other.annotations
            && self.extra == other.extra
            && self.raw_line == other.raw_line
            && self.parse_errors == other.parse_errors
    }
}

impl AuditRecord {
    /// Empty record anchored to its input line.
    pub fn for_line(line: &str) -> Self {
        Self {
            raw_line: line.to_string(),
            parsed_at: Utc::now().to_rfc3339(),
            ..Default::default()
        }
    }

    /// Whether any semantic field was decoded, as opposed to only the raw
    /// line being retained.
    pub fn has_content(&self) -> bool {
        !self.timestamp.is_empty()
            || !self.username.is_empty()
            || !self.verb.is_empty()
            || !self.resource.is_empty()
            || !self.request_uri.is_empty()
            || self.status_code.is_some()
    }
}

// ----------------------------------------------------------------------
// Wire schema (strict strategy)
// ----------------------------------------------------------------------

/// The standard cluster audit event, as emitted by the API servers. Strict
/// decoding rejects shape drift (string status codes, non-string annotation
/// values); the fallback strategies absorb those.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireEvent {
    pub kind: String,
    pub api_version: String,
    pub level: String,
    #[serde(rename = "auditID")]
    pub audit_id: String,
    pub stage: String,
    #[serde(rename = "requestURI")]
    pub request_uri: String,
    pub verb: String,
    pub user: WireUser,
    pub impersonated_user: Option<WireUser>,
    #[serde(rename = "sourceIPs")]
    pub source_ips: Vec<String>,
    pub user_agent: String,
    pub object_ref: Option<WireObjectRef>,
    pub response_status: Option<WireStatus>,
    pub request_received_timestamp: String,
    pub stage_timestamp: String,
    pub annotations: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireUser {
    pub username: String,
    pub uid: String,
    pub groups: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct WireObjectRef {
    pub resource: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename = "apiGroup")]
    pub api_group: String,
    #[serde(rename = "apiVersion")]
    pub api_version: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct WireStatus {
    pub code: Option<i64>,
    pub message: String,
    pub reason: String,
    pub status: String,
}

impl WireEvent {
    /// Fold the wire event into a record anchored to `line`.
    pub(crate) fn into_record(self, line: &str) -> AuditRecord {
        let mut record = AuditRecord::for_line(line);

        record.timestamp = self.request_received_timestamp;
        record.username = self.user.username;
        record.user_uid = self.user.uid;
        record.groups = self.user.groups;
        record.verb = self.verb;
        record.request_uri = self.request_uri;
        record.user_agent = self.user_agent;
        record.source_ips = self.source_ips;

        if let Some(object_ref) = self.object_ref {
            record.resource = object_ref.resource;
            record.namespace = object_ref.namespace;
            record.name = object_ref.name;
            record.api_group = object_ref.api_group;
            record.api_version = object_ref.api_version;
        }

        if let Some(status) = self.response_status {
            record.status_code = status.code;
            record.status_message = status.message;
            record.status_reason = status.reason;
        }

        if let Some(impersonated) = self.impersonated_user {
            record.impersonated_user = impersonated.username;
        }

        record.auth_decision = self
            .annotations
            .get(DECISION_ANNOTATION)
            .cloned()
            .unwrap_or_default();
        record.auth_reason = self
            .annotations
            .get(REASON_ANNOTATION)
            .cloned()
            .unwrap_or_default();
        record.annotations = self.annotations;

        // Anything the schema does not know about rides along.
        let mut extra = self.extra;
        if !self.kind.is_empty() {
            extra.insert("kind".to_string(), self.kind.into());
        }
        if !self.api_version.is_empty() {
            extra.insert("apiVersion".to_string(), self.api_version.into());
        }
        if !self.level.is_empty() {
            extra.insert("level".to_string(), self.level.into());
        }
        if !self.audit_id.is_empty() {
            extra.insert("auditID".to_string(), self.audit_id.into());
        }
        if !self.stage.is_empty() {
            extra.insert("stage".to_string(), self.stage.into());
        }
        if !self.stage_timestamp.is_empty() {
            extra.insert("stageTimestamp".to_string(), self.stage_timestamp.into());
        }
        record.extra = extra;

        record
    }
}
