//! End-to-End tests for the MCP dispatch path.
//!
//! These drive the server's request handler with real JSON-RPC payloads and
//! a real trail file. No mocks - the engine, cache and trail behind the
//! tools are the production ones.

use auditscope_mcp::{
    rpc::{Request, RequestId, Response, VERSION},
    McpServer, McpServerConfig,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn test_server(temp: &TempDir) -> McpServer {
    let config = McpServerConfig {
        audit_trail_path: temp.path().join("trail.json"),
        ..Default::default()
    };
    McpServer::new(config)
}

fn request(method: &str, params: Value) -> Request {
    Request {
        jsonrpc: VERSION.to_string(),
        id: Some(RequestId::Number(1)),
        method: method.to_string(),
        params: Some(params),
    }
}

fn initialize(server: &mut McpServer) {
    let response = server
        .handle(request(
            "initialize",
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": { "name": "test-client", "version": "0.0.1" }
            }),
        ))
        .expect("id'd initialize gets a reply");
    assert!(response.error.is_none(), "initialize failed: {:?}", response.error);
}

fn call_tool(server: &mut McpServer, name: &str, arguments: Value) -> Response {
    server
        .handle(request(
            "tools/call",
            json!({ "name": name, "arguments": arguments }),
        ))
        .expect("id'd tool call gets a reply")
}

/// Unwrap the text content block and parse it back into JSON.
fn tool_payload(response: &Response) -> Value {
    let result = response.result.as_ref().expect("expected a result");
    let text = result["content"][0]["text"].as_str().expect("text block");
    serde_json::from_str(text).expect("payload is JSON")
}

// =============================================================================
// PROTOCOL SURFACE
// =============================================================================

#[test]
fn test_tools_call_requires_initialization() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);

    let response = call_tool(&mut server, "get_cache_stats", json!({}));
    assert_eq!(response.error.unwrap().code, -32002);
}

#[test]
fn test_tools_list_catalogue() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    let response = server.handle(request("tools/list", json!({}))).unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    assert_eq!(tools.len(), 9);
    for tool in &tools {
        assert!(tool["name"].is_string());
        assert!(tool["description"].is_string());
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
    assert!(tools
        .iter()
        .any(|t| t["name"] == "execute_complete_audit_query"));
}

#[test]
fn test_unknown_method_is_32601() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    let response = server.handle(request("resources/list", json!({}))).unwrap();
    assert_eq!(response.error.unwrap().code, -32601);
}

#[test]
fn test_unknown_tool_is_32601() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    let response = call_tool(&mut server, "no_such_tool", json!({}));
    assert_eq!(response.error.unwrap().code, -32601);
}

#[test]
fn test_non_object_arguments_are_32602() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    let response = call_tool(&mut server, "get_cache_stats", json!([1, 2, 3]));
    assert_eq!(response.error.unwrap().code, -32602);
}

#[test]
fn test_missing_required_key_is_32602() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    let response = call_tool(&mut server, "get_cached_result", json!({}));
    assert_eq!(response.error.unwrap().code, -32602);

    let response = call_tool(
        &mut server,
        "generate_audit_query_with_result",
        json!({ "parameters": { "log_source": 17 } }),
    );
    assert_eq!(response.error.unwrap().code, -32602);
}

#[test]
fn test_ping() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    let response = server.handle(request("ping", json!({}))).unwrap();
    assert!(response.error.is_none());
}

#[test]
fn test_notifications_receive_no_reply() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);

    let notification = Request {
        jsonrpc: VERSION.to_string(),
        id: None,
        method: "notifications/initialized".to_string(),
        params: None,
    };
    assert!(server.handle(notification).is_none());

    // Even a failing notification stays silent.
    let bad = Request {
        jsonrpc: VERSION.to_string(),
        id: None,
        method: "no/such/method".to_string(),
        params: None,
    };
    assert!(server.handle(bad).is_none());
}

#[test]
fn test_handle_line_wire_roundtrip() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);

    assert!(server.handle_line("").is_none());

    let garbled = server.handle_line("{not json").unwrap();
    let response: Value = serde_json::from_str(&garbled).unwrap();
    assert_eq!(response["error"]["code"], -32700);

    let pong = server
        .handle_line(r#"{"jsonrpc":"2.0","id":9,"method":"ping"}"#)
        .unwrap();
    let response: Value = serde_json::from_str(&pong).unwrap();
    assert_eq!(response["id"], 9);
    assert!(response.get("error").is_none());
}

// =============================================================================
// QUERY LIFECYCLE TOOLS
// =============================================================================

#[test]
fn test_generate_tool_produces_tracked_result() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    let response = call_tool(
        &mut server,
        "generate_audit_query_with_result",
        json!({
            "parameters": {
                "log_source": "kube-apiserver",
                "patterns": ["pods", "delete"],
                "exclude_patterns": ["system:"],
                "username": "admin"
            }
        }),
    );

    let payload = tool_payload(&response);
    assert_eq!(payload["error"], "");
    let command = payload["command"].as_str().unwrap();
    assert!(command.starts_with("oc adm node-logs --role=master --path=kube-apiserver/audit.log"));
    assert!(command.contains("grep -v 'system:'"));
    assert!(payload["query_id"].as_str().unwrap().starts_with("query-"));
}

#[test]
fn test_generate_tool_domain_failure_stays_in_result() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    let response = call_tool(
        &mut server,
        "generate_audit_query_with_result",
        json!({ "parameters": { "log_source": "etcd" } }),
    );

    // Domain failure: the tool succeeds, the result carries the error.
    assert!(response.error.is_none());
    let payload = tool_payload(&response);
    assert_eq!(payload["error"], "invalid log_source: etcd");
    assert_eq!(payload["command"], "");
}

#[test]
fn test_parse_tool_roundtrip() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    let line = r#"{"verb":"get","user":{"username":"admin"},"responseStatus":{"code":403},"requestReceivedTimestamp":"2024-03-14T10:00:00Z"}"#;
    let response = call_tool(
        &mut server,
        "parse_audit_results_with_result",
        json!({
            "query_result": {
                "query_id": "query-test",
                "timestamp": "2024-03-14T10:00:00Z",
                "command": "placeholder",
                "raw_output": line
            }
        }),
    );

    let payload = tool_payload(&response);
    assert_eq!(payload["records"].as_array().unwrap().len(), 1);
    assert_eq!(payload["records"][0]["username"], "admin");
    assert!(payload["summary"]
        .as_str()
        .unwrap()
        .contains("auth_error: 1"));
}

// =============================================================================
// CACHE TOOLS
// =============================================================================

#[test]
fn test_cache_tool_flow() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    // Miss -> -32001
    let response = call_tool(&mut server, "get_cached_result", json!({ "query_id": "query-x" }));
    assert_eq!(response.error.unwrap().code, -32001);

    // Seed the cache through the engine the tools share.
    let mut result = auditscope_core::QueryResult::new();
    result.command = "oc adm node-logs --role=master --path=audit/audit.log".to_string();
    let query_id = result.query_id.clone();
    server.context().engine.cache().set(query_id.clone(), result);

    // Hit
    let response = call_tool(&mut server, "get_cached_result", json!({ "query_id": query_id }));
    let payload = tool_payload(&response);
    assert_eq!(payload["query_id"], query_id.as_str());

    // Stats reflect the traffic
    let response = call_tool(&mut server, "get_cache_stats", json!({}));
    let stats = tool_payload(&response);
    assert_eq!(stats["size"], 1);
    assert!(stats["hits"].as_u64().unwrap() >= 1);
    assert!(stats["misses"].as_u64().unwrap() >= 1);

    // Delete, then the second delete is -32001
    let response =
        call_tool(&mut server, "delete_cached_result", json!({ "query_id": query_id }));
    assert_eq!(tool_payload(&response)["deleted"], true);
    let response =
        call_tool(&mut server, "delete_cached_result", json!({ "query_id": query_id }));
    assert_eq!(response.error.unwrap().code, -32001);

    // Clear reports a count
    let response = call_tool(&mut server, "clear_cache", json!({}));
    assert_eq!(tool_payload(&response)["cleared"], 0);
}

#[test]
fn test_cache_operations_reach_the_trail() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    call_tool(&mut server, "get_cached_result", json!({ "query_id": "query-y" }));
    call_tool(&mut server, "clear_cache", json!({}));

    let content = std::fs::read_to_string(temp.path().join("trail.json")).unwrap();
    let actions: Vec<String> = content
        .lines()
        .map(|l| {
            serde_json::from_str::<Value>(l).unwrap()["action"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert!(actions.contains(&"cache_miss".to_string()));
    assert!(actions.contains(&"cache_clear".to_string()));
}

// =============================================================================
// SERVER STATS
// =============================================================================

#[test]
fn test_server_stats_counts_calls() {
    let temp = TempDir::new().unwrap();
    let mut server = test_server(&temp);
    initialize(&mut server);

    call_tool(&mut server, "get_cache_stats", json!({}));
    call_tool(&mut server, "get_cache_stats", json!({}));

    let response = call_tool(&mut server, "get_server_stats", json!({}));
    let stats = tool_payload(&response);
    assert_eq!(stats["server_name"], "auditscope-mcp");
    assert_eq!(stats["tool_calls"]["get_cache_stats"], 2);
    assert!(stats["requests"].as_u64().unwrap() >= 3);
    assert_eq!(stats["audit_trail_enabled"], true);
}

// =============================================================================
// RESPONSE BUDGET
// =============================================================================

#[test]
fn test_oversized_response_becomes_truncation_notice() {
    let temp = TempDir::new().unwrap();
    let config = McpServerConfig {
        audit_trail_path: temp.path().join("trail.json"),
        max_response_bytes: 64,
        ..Default::default()
    };
    let mut server = McpServer::new(config);
    initialize(&mut server);

    let response = call_tool(&mut server, "get_server_stats", json!({}));
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    let notice: Value = serde_json::from_str(text).unwrap();
    assert_eq!(notice["truncated"], true);
}
