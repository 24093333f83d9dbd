//! Query lifecycle tools: generate, execute, parse, and the complete
//! pipeline.

use super::{typed_args, McpTool, ToolContext, ToolError};
use auditscope_core::{QueryParameters, QueryResult};
use serde::Deserialize;
use serde_json::{json, Value};

/// JSON Schema fragment for the `parameters` argument, shared by the tools
/// that take query parameters.
fn parameters_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "log_source": {
                "type": "string",
                "enum": ["kube-apiserver", "oauth-server", "openshift-apiserver", "oauth-apiserver", "node"],
                "description": "Which audit log to read"
            },
            "patterns": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Include patterns, case-insensitive (first 3 honoured)"
            },
            "exclude_patterns": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Exclude patterns (first 3 honoured)"
            },
            "timeframe": {
                "type": "string",
                "description": "Human time expression, e.g. 'yesterday', 'last 7 days', '2h ago', 'since 2024-03-01'"
            },
            "username": { "type": "string" },
            "resource": { "type": "string" },
            "verb": {
                "type": "string",
                "description": "API verb, or a |-separated disjunction of verbs"
            },
            "namespace": { "type": "string" }
        },
        "required": ["log_source"]
    })
}

#[derive(Debug, Deserialize)]
struct ParametersArgs {
    parameters: QueryParameters,
}

#[derive(Debug, Deserialize)]
struct ResultArgs {
    query_result: QueryResult,
    #[serde(default)]
    parameters: QueryParameters,
}

// ----------------------------------------------------------------------
// generate_audit_query_with_result
// ----------------------------------------------------------------------

pub struct GenerateQueryTool;

impl McpTool for GenerateQueryTool {
    fn name(&self) -> &'static str {
        "generate_audit_query_with_result"
    }

    fn description(&self) -> &'static str {
        "Compile query parameters into a safe, validated audit-log pipeline and return the tracked result"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "parameters": parameters_schema() },
            "required": ["parameters"]
        })
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ParametersArgs = typed_args(args)?;
        let result = ctx.engine.generate(&args.parameters);
        Ok(serde_json::to_value(result).map_err(anyhow::Error::from)?)
    }
}

// ----------------------------------------------------------------------
// execute_audit_query_with_result
// ----------------------------------------------------------------------

pub struct ExecuteQueryTool;

impl McpTool for ExecuteQueryTool {
    fn name(&self) -> &'static str {
        "execute_audit_query_with_result"
    }

    fn description(&self) -> &'static str {
        "Run the compiled pipeline of a generated result under the execution deadline, capturing combined output"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query_result": {
                    "type": "object",
                    "description": "A result from generate_audit_query_with_result, carrying the compiled command"
                },
                "parameters": parameters_schema()
            },
            "required": ["query_result"]
        })
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ResultArgs = typed_args(args)?;
        let mut result = args.query_result;
        ctx.engine.execute(&mut result, &args.parameters);
        Ok(serde_json::to_value(result).map_err(anyhow::Error::from)?)
    }
}

// ----------------------------------------------------------------------
// parse_audit_results_with_result
// ----------------------------------------------------------------------

pub struct ParseResultsTool;

impl McpTool for ParseResultsTool {
    fn name(&self) -> &'static str {
        "parse_audit_results_with_result"
    }

    fn description(&self) -> &'static str {
        "Decode the captured raw output of an executed result into typed audit records with a summary"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query_result": {
                    "type": "object",
                    "description": "A result from execute_audit_query_with_result, carrying raw output"
                },
                "parameters": parameters_schema()
            },
            "required": ["query_result"]
        })
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ResultArgs = typed_args(args)?;
        let mut result = args.query_result;
        ctx.engine.parse(&mut result, &args.parameters);
        Ok(serde_json::to_value(result).map_err(anyhow::Error::from)?)
    }
}

// ----------------------------------------------------------------------
// execute_complete_audit_query
// ----------------------------------------------------------------------

pub struct CompleteQueryTool;

impl McpTool for CompleteQueryTool {
    fn name(&self) -> &'static str {
        "execute_complete_audit_query"
    }

    fn description(&self) -> &'static str {
        "Run the whole pipeline: generate, cache lookup, execute, parse, cache the result"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "parameters": parameters_schema() },
            "required": ["parameters"]
        })
    }

    fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ParametersArgs = typed_args(args)?;
        let result = ctx.engine.complete(&args.parameters);
        Ok(serde_json::to_value(result).map_err(anyhow::Error::from)?)
    }
}
