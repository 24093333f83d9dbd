//! Cache management tools.

use super::{typed_args, McpTool, ToolContext, ToolError};
use auditscope_core::trail::{TrailAction, TrailEntry};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct QueryIdArgs {
    query_id: String,
}

fn query_id_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query_id": {
                "type": "string",
                "description": "Identifier assigned at query generation"
            }
        },
        "required": ["query_id"]
    })
}

// ----------------------------------------------------------------------
// get_cache_stats
// ----------------------------------------------------------------------

pub struct CacheStatsTool;

impl McpTool for CacheStatsTool {
    fn name(&self) -> &'static str {
        "get_cache_stats"
    }

    fn description(&self) -> &'static str {
        "Report cache size, hit/miss counters, hit rate and entry age buckets"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let stats = ctx.engine.cache().stats();
        Ok(serde_json::to_value(stats).map_err(anyhow::Error::from)?)
    }
}

// ----------------------------------------------------------------------
// clear_cache
// ----------------------------------------------------------------------

pub struct ClearCacheTool;

impl McpTool for ClearCacheTool {
    fn name(&self) -> &'static str {
        "clear_cache"
    }

    fn description(&self) -> &'static str {
        "Drop every cached result"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let cleared = ctx.engine.cache().clear();
        ctx.engine
            .trail()
            .record(&TrailEntry::new(TrailAction::CacheClear, "*"));
        Ok(json!({ "cleared": cleared }))
    }
}

// ----------------------------------------------------------------------
// get_cached_result
// ----------------------------------------------------------------------

pub struct GetCachedResultTool;

impl McpTool for GetCachedResultTool {
    fn name(&self) -> &'static str {
        "get_cached_result"
    }

    fn description(&self) -> &'static str {
        "Fetch a cached query result by identifier"
    }

    fn input_schema(&self) -> Value {
        query_id_schema()
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: QueryIdArgs = typed_args(args)?;
        match ctx.engine.cache().get(&args.query_id) {
            Some(result) => {
                ctx.engine
                    .trail()
                    .record(&TrailEntry::new(TrailAction::CacheHit, &args.query_id));
                Ok(serde_json::to_value(result).map_err(anyhow::Error::from)?)
            }
            None => {
                ctx.engine
                    .trail()
                    .record(&TrailEntry::new(TrailAction::CacheMiss, &args.query_id));
                Err(ToolError::NotFound(args.query_id))
            }
        }
    }
}

// ----------------------------------------------------------------------
// delete_cached_result
// ----------------------------------------------------------------------

pub struct DeleteCachedResultTool;

impl McpTool for DeleteCachedResultTool {
    fn name(&self) -> &'static str {
        "delete_cached_result"
    }

    fn description(&self) -> &'static str {
        "Remove a cached query result by identifier"
    }

    fn input_schema(&self) -> Value {
        query_id_schema()
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: QueryIdArgs = typed_args(args)?;
        if ctx.engine.cache().delete(&args.query_id) {
            ctx.engine
                .trail()
                .record(&TrailEntry::new(TrailAction::CacheDelete, &args.query_id));
            Ok(json!({ "deleted": true, "query_id": args.query_id }))
        } else {
            Err(ToolError::NotFound(args.query_id))
        }
    }
}
