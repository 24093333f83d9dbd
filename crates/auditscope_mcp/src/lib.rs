//! MCP (Model Context Protocol) Server for Auditscope
//!
//! Exposes the audit-log query engine as MCP tools, so AI assistants can
//! compile, run and inspect cluster audit queries programmatically.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         MCP Client                              │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               │ MCP Protocol (JSON-RPC over stdio)
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     auditscope_mcp                              │
//! │                                                                 │
//! │  Server    │ JSON-RPC stdio loop, tool dispatch, budgets        │
//! │  Registry  │ nine named tools, typed argument coercion          │
//! │  Tools     │ generate / execute / parse / complete,             │
//! │            │ cache management, server stats                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                       auditscope_core
//! ```
//!
//! # Design Principles
//!
//! 1. **Typed at the boundary:** tool arguments are coerced into typed
//!    request records before a tool body runs; shape errors map to
//!    `-32602` and never reach the engine.
//!
//! 2. **Domain failures are data:** a failed query still produces a whole
//!    `QueryResult` with its error inside. Only protocol-level problems
//!    (unknown tool, bad params, missing cached result) become JSON-RPC
//!    errors.
//!
//! 3. **Quiet stdout:** the protocol owns stdout; all logging goes through
//!    tracing to stderr and the log file.

pub mod mcp;
pub mod rpc;
pub mod server;
pub mod tools;

// Re-exports for convenience
pub use mcp::{ToolReply, ToolSpec};
pub use rpc::{Request, RequestId, Response, RpcError};
pub use server::{McpServer, McpServerConfig};
pub use tools::{McpTool, ServerStats, ToolContext, ToolError, ToolRegistry};
