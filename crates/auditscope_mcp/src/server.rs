//! The stdio MCP server.
//!
//! A blocking line loop: each stdin line is parsed, dispatched, and
//! answered with at most one stdout line. Every handler returns
//! `Result<Value, RpcError>`; the JSON-RPC envelope is applied in exactly
//! one place, and notifications are dropped there too. No async runtime:
//! the shared state behind the tools carries its own locks, so the
//! dispatch path holds none.

use crate::mcp::{methods, InitializeRequest, ToolCall, ToolReply, PROTOCOL_VERSION};
use crate::rpc::{code, Request, Response, RpcError, VERSION};
use crate::tools::{ServerStats, ToolContext, ToolError, ToolRegistry};
use anyhow::{Context, Result};
use auditscope_core::cache::{spawn_sweeper, QueryCache, SweeperHandle, SWEEP_INTERVAL};
use auditscope_core::trail::{AuditTrail, DEFAULT_TRAIL_PATH};
use auditscope_core::QueryEngine;
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// MCP server configuration.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Server name (reported in initialize)
    pub server_name: String,

    /// Server version (reported in initialize)
    pub server_version: String,

    /// Cache entry lifetime
    pub cache_ttl: Duration,

    /// Where the audit trail is appended
    pub audit_trail_path: PathBuf,

    /// Maximum response size in bytes
    pub max_response_bytes: usize,
}

impl Default for McpServerConfig {
    fn default() -> Self {
        Self {
            server_name: "auditscope-mcp".to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
            cache_ttl: auditscope_core::cache::DEFAULT_TTL,
            audit_trail_path: PathBuf::from(DEFAULT_TRAIL_PATH),
            max_response_bytes: 1024 * 1024, // 1MB
        }
    }
}

impl McpServerConfig {
    /// Defaults overlaid with the recognised environment variables:
    /// `CACHE_TTL` (seconds) and `AUDIT_TRAIL_PATH`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(ttl) = std::env::var("CACHE_TTL") {
            match ttl.parse::<u64>() {
                Ok(secs) => config.cache_ttl = Duration::from_secs(secs),
                Err(_) => warn!("Ignoring unparseable CACHE_TTL: {}", ttl),
            }
        }
        if let Ok(path) = std::env::var("AUDIT_TRAIL_PATH") {
            config.audit_trail_path = PathBuf::from(path);
        }
        config
    }
}

/// MCP server over stdio.
pub struct McpServer {
    ctx: ToolContext,
    tools: ToolRegistry,
    /// Background eviction sweep; stops on drop.
    #[allow(dead_code)]
    sweeper: SweeperHandle,
    initialized: bool,
}

impl McpServer {
    /// Wire the engine, cache, trail and tool registry together.
    pub fn new(config: McpServerConfig) -> Self {
        let cache = Arc::new(QueryCache::new(config.cache_ttl));
        let sweeper = spawn_sweeper(Arc::clone(&cache), SWEEP_INTERVAL);
        let trail = Arc::new(AuditTrail::open(&config.audit_trail_path));
        let engine = QueryEngine::new(cache, trail);

        let ctx = ToolContext {
            engine,
            config,
            stats: ServerStats::new(),
        };

        Self {
            ctx,
            tools: ToolRegistry::new(),
            sweeper,
            initialized: false,
        }
    }

    /// The context the tools run against; test access.
    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Serve until stdin closes.
    pub fn run(&mut self) -> Result<()> {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();

        info!("Serving MCP on stdio");
        for line in stdin.lock().lines() {
            let line = line.context("Failed to read from stdin")?;
            if let Some(reply) = self.handle_line(line.trim()) {
                writeln!(stdout, "{}", reply)?;
                stdout.flush()?;
            }
        }
        info!("stdin closed, MCP server exiting");
        Ok(())
    }

    /// One wire line in, at most one wire line out. Blank lines and
    /// notifications produce nothing.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return None;
        }
        debug!("<- {}", line);

        let reply = match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request)?,
            Err(e) => Response::fail(
                None,
                RpcError::new(code::PARSE_ERROR, format!("invalid JSON: {}", e)),
            ),
        };

        let wire = serde_json::to_string(&reply)
            .unwrap_or_else(|_| r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"reply serialization failed"}}"#.to_string());
        debug!("-> {}", wire);
        Some(wire)
    }

    /// Dispatch one request. `None` for notifications, which are handled
    /// for their side effects but never answered.
    pub fn handle(&mut self, request: Request) -> Option<Response> {
        self.ctx.stats.count_request();
        let Request {
            jsonrpc,
            id,
            method,
            params,
        } = request;

        let outcome = if jsonrpc != VERSION {
            Err(RpcError::new(
                code::INVALID_REQUEST,
                format!("unsupported JSON-RPC version: {}", jsonrpc),
            ))
        } else {
            self.dispatch(&method, params)
        };

        if id.is_none() {
            if let Err(e) = outcome {
                debug!("Dropping error for notification {}: {}", method, e);
            }
            return None;
        }

        Some(match outcome {
            Ok(value) => Response::ok(id, value),
            Err(e) => Response::fail(id, e),
        })
    }

    fn dispatch(&mut self, method: &str, params: Option<Value>) -> Result<Value, RpcError> {
        match method {
            methods::INITIALIZE => self.on_initialize(params),
            // The initialized notification carries nothing to act on; an
            // id'd variant gets an empty acknowledgement.
            methods::INITIALIZED => Ok(Value::Null),
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => Ok(json!({ "tools": self.tools.catalogue() })),
            methods::TOOLS_CALL => self.on_tool_call(params),
            other => Err(RpcError::new(
                code::METHOD_NOT_FOUND,
                format!("unknown method: {}", other),
            )),
        }
    }

    fn on_initialize(&mut self, params: Option<Value>) -> Result<Value, RpcError> {
        let handshake: InitializeRequest = parse_params(params)?;
        info!(
            "Initialize from {} v{} (protocol {})",
            handshake.client_info.name, handshake.client_info.version, handshake.protocol_version
        );
        self.initialized = true;

        Ok(json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": self.ctx.config.server_name,
                "version": self.ctx.config.server_version,
            },
        }))
    }

    fn on_tool_call(&self, params: Option<Value>) -> Result<Value, RpcError> {
        if !self.initialized {
            return Err(RpcError::new(code::NOT_INITIALIZED, "server not initialized"));
        }

        let call: ToolCall = parse_params(params)?;
        info!("Tool call: {}", call.name);

        match self.tools.call_tool(&call.name, call.arguments, &self.ctx) {
            Ok(value) => self.envelope_within_budget(value),
            Err(e) => {
                warn!("Tool {} failed: {}", call.name, e);
                self.ctx.stats.count_tool_error();
                Err(wire_error(e))
            }
        }
    }

    /// Wrap tool output in the MCP content envelope under the response
    /// budget. Oversized payloads become a structured truncation notice
    /// instead of JSON cut mid-string.
    fn envelope_within_budget(&self, value: Value) -> Result<Value, RpcError> {
        let payload = serde_json::to_string(&value)
            .map_err(|e| RpcError::internal(format!("tool result serialization failed: {}", e)))?;

        let budget = self.ctx.config.max_response_bytes;
        let reply = if payload.len() > budget {
            warn!("Tool reply of {} bytes exceeds the {} byte budget", payload.len(), budget);
            ToolReply::flagged(
                json!({
                    "truncated": true,
                    "max_bytes": budget,
                    "original_bytes": payload.len(),
                    "message": "Response exceeded size limit. Narrow the query or fetch the cached result in parts.",
                })
                .to_string(),
            )
        } else {
            ToolReply::text(payload)
        };

        serde_json::to_value(reply)
            .map_err(|e| RpcError::internal(format!("reply envelope serialization failed: {}", e)))
    }
}

/// Coerce method params, mapping absence and shape drift to -32602.
fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::invalid_params("missing params"))?;
    serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

/// Map a tool failure onto its wire code.
fn wire_error(e: ToolError) -> RpcError {
    let code = match &e {
        ToolError::UnknownTool(_) => code::METHOD_NOT_FOUND,
        ToolError::InvalidParams(_) => code::INVALID_PARAMS,
        ToolError::NotFound(_) => code::CACHED_RESULT_NOT_FOUND,
        ToolError::Failed(_) => code::TOOL_FAILED,
    };
    RpcError::new(code, e.to_string())
}
