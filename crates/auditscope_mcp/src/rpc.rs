//! The JSON-RPC 2.0 envelope the MCP transport is framed in.
//!
//! One JSON object per line in each direction. A request without an `id`
//! is a notification and must never be answered. A response carries
//! exactly one of `result` or `error`; the dispatcher works in
//! `Result<Value, RpcError>` and the envelope is applied at a single
//! point, so that exclusivity holds by construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Protocol version tag carried by every message.
pub const VERSION: &str = "2.0";

/// Wire error codes: the standard JSON-RPC set plus this server's domain
/// range.
pub mod code {
    /// The line was not valid JSON.
    pub const PARSE_ERROR: i32 = -32700;
    /// The envelope itself was malformed (wrong version tag).
    pub const INVALID_REQUEST: i32 = -32600;
    /// Unknown method, or unknown tool name.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Params or tool arguments missing or of the wrong shape.
    pub const INVALID_PARAMS: i32 = -32602;
    /// The server failed to build a reply.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// A tool ran and failed.
    pub const TOOL_FAILED: i32 = -32000;
    /// No cached result under the requested identifier.
    pub const CACHED_RESULT_NOT_FOUND: i32 = -32001;
    /// tools/call arrived before initialize.
    pub const NOT_INITIALIZED: i32 = -32002;
}

/// Request identifier: clients may send numbers or strings. Its absence
/// marks a notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    Text(String),
}

/// One incoming message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    /// Notifications carry no id and expect no reply.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// One outgoing message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: Option<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn fail(id: Option<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// The error half of a response. Also the error type of the dispatcher,
/// so handlers can bubble wire-ready failures with `?`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(code::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(code::INTERNAL_ERROR, message)
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for RpcError {}
