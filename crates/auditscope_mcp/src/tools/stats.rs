//! Server introspection: request counters and the get_server_stats tool.

use super::{McpTool, ToolContext, ToolError};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Process-lifetime counters. Atomics for the hot counts; the per-tool map
/// sits behind its own mutex and is touched once per tool call.
#[derive(Debug)]
pub struct ServerStats {
    started: Instant,
    requests: AtomicU64,
    tool_errors: AtomicU64,
    tool_calls: Mutex<BTreeMap<String, u64>>,
}

impl ServerStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            tool_errors: AtomicU64::new(0),
            tool_calls: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn count_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count_tool_call(&self, tool: &str) {
        let mut calls = self.tool_calls.lock().expect("stats lock poisoned");
        *calls.entry(tool.to_string()).or_insert(0) += 1;
    }

    pub fn count_tool_error(&self) {
        self.tool_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn tool_errors(&self) -> u64 {
        self.tool_errors.load(Ordering::Relaxed)
    }

    pub fn tool_calls(&self) -> BTreeMap<String, u64> {
        self.tool_calls.lock().expect("stats lock poisoned").clone()
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------
// get_server_stats
// ----------------------------------------------------------------------

pub struct ServerStatsTool;

impl McpTool for ServerStatsTool {
    fn name(&self) -> &'static str {
        "get_server_stats"
    }

    fn description(&self) -> &'static str {
        "Report server uptime, request counters, per-tool call counts and cache statistics"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        Ok(json!({
            "server_name": ctx.config.server_name,
            "server_version": ctx.config.server_version,
            "uptime_seconds": ctx.stats.uptime_seconds(),
            "requests": ctx.stats.requests(),
            "tool_calls": ctx.stats.tool_calls(),
            "tool_errors": ctx.stats.tool_errors(),
            "cache": serde_json::to_value(ctx.engine.cache().stats()).map_err(anyhow::Error::from)?,
            "audit_trail_enabled": ctx.engine.trail().is_enabled(),
        }))
    }
}
