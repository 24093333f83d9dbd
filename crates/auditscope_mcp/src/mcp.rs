//! MCP-level vocabulary on top of the JSON-RPC envelope: method names,
//! the initialize handshake, and the tool catalogue and reply shapes.
//!
//! Only the shapes this server actually keys off are typed. Client
//! capabilities, for instance, arrive as an opaque value because nothing
//! here varies on them; the handshake result is likewise assembled as
//! literal JSON at the one place it is produced.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The MCP revision this server speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Method names the dispatcher recognises.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "notifications/initialized";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const PING: &str = "ping";
}

/// The initialize handshake from the client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    pub protocol_version: String,
    /// Accepted as-is; the server keys nothing off client capabilities.
    #[serde(default)]
    pub capabilities: Value,
    pub client_info: PeerInfo,
}

/// Name and version of either endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub name: String,
    pub version: String,
}

/// One catalogue entry in the tools/list reply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// tools/call parameters: which tool, with what arguments.
#[derive(Debug, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// The MCP reply envelope for one tool call.
#[derive(Debug, Serialize)]
pub struct ToolReply {
    pub content: Vec<TextBlock>,
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolReply {
    /// A successful reply carrying one text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextBlock::new(text)],
            is_error: false,
        }
    }

    /// A reply flagged as an error, e.g. a truncation notice.
    pub fn flagged(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextBlock::new(text)],
            is_error: true,
        }
    }
}

/// A `{"type": "text", ...}` content block. Text is the only content kind
/// this server emits.
#[derive(Debug, Serialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl TextBlock {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "text",
            text: text.into(),
        }
    }
}
