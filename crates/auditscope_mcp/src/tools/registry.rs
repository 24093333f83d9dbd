//! Tool Registry - Tool Discovery and Dispatch
//!
//! Maintains the list of available tools and dispatches calls by name.

use super::{McpTool, ToolContext, ToolError};
use crate::mcp::ToolSpec;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Registry of available MCP tools
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn McpTool>>,
}

impl ToolRegistry {
    /// Create a new tool registry with all tools registered
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register(Box::new(super::query::GenerateQueryTool));
        registry.register(Box::new(super::query::ExecuteQueryTool));
        registry.register(Box::new(super::query::ParseResultsTool));
        registry.register(Box::new(super::query::CompleteQueryTool));
        registry.register(Box::new(super::cache::CacheStatsTool));
        registry.register(Box::new(super::cache::ClearCacheTool));
        registry.register(Box::new(super::cache::GetCachedResultTool));
        registry.register(Box::new(super::cache::DeleteCachedResultTool));
        registry.register(Box::new(super::stats::ServerStatsTool));

        debug!("Registered {} tools", registry.tools.len());

        registry
    }

    /// Register a tool
    fn register(&mut self, tool: Box<dyn McpTool>) {
        let name = tool.name().to_string();
        debug!("Registering tool: {}", name);
        self.tools.insert(name, tool);
    }

    /// The tool catalogue, in name order.
    pub fn catalogue(&self) -> Vec<ToolSpec> {
        let mut specs: Vec<ToolSpec> = self.tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Call a tool by name. The argument value must be an object; anything
    /// else is a shape failure before the tool runs.
    pub fn call_tool(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        if !args.is_object() {
            return Err(ToolError::InvalidParams(format!(
                "arguments must be an object, got {}",
                json_type_name(&args)
            )));
        }

        ctx.stats.count_tool_call(name);
        tool.execute(args, ctx)
    }

    /// Check if a tool exists
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
