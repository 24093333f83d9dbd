//! MCP Tool Implementations
//!
//! Each tool exposes one engine capability via the MCP protocol. Tools are
//! registered in the ToolRegistry and dispatched by name.
//!
//! # Tool Categories
//!
//! - **Query lifecycle**: generate_audit_query_with_result,
//!   execute_audit_query_with_result, parse_audit_results_with_result,
//!   execute_complete_audit_query
//! - **Cache**: get_cache_stats, clear_cache, get_cached_result,
//!   delete_cached_result
//! - **Introspection**: get_server_stats
//!
//! # Typed boundaries
//!
//! Arguments arrive as JSON objects and are coerced into typed request
//! records at the registry boundary; tool bodies never see raw maps, so a
//! shape error surfaces as `-32602` before any work happens.

mod cache;
mod query;
mod registry;
mod stats;

pub use registry::ToolRegistry;
pub use stats::ServerStats;

use crate::mcp::ToolSpec;
use crate::server::McpServerConfig;
use auditscope_core::QueryEngine;
use serde_json::Value;
use thiserror::Error;

/// What a tool needs to do its work.
pub struct ToolContext {
    pub engine: QueryEngine,
    pub config: McpServerConfig,
    pub stats: ServerStats,
}

/// Tool failures, each mapping to a JSON-RPC error code at the dispatch
/// boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    /// -32601: the tool name is not in the catalogue.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// -32602: arguments missing or of the wrong shape.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// -32001: the requested cached result does not exist.
    #[error("cached result not found: {0}")]
    NotFound(String),

    /// -32000: the tool ran and failed.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Trait for MCP tools.
///
/// All tool execution is synchronous; the dispatcher is re-entrant and the
/// shared state behind the context carries its own locks.
pub trait McpTool: Send + Sync {
    /// Tool name (e.g., "execute_complete_audit_query")
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool (synchronous)
    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError>;

    /// The catalogue entry for tools/list
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// Coerce the argument object into a typed request record, mapping shape
/// failures to `-32602`.
pub(crate) fn typed_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidParams(e.to_string()))
}
