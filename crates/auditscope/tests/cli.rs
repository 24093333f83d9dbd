//! Smoke tests for the launcher binary.

use std::process::Command;
use tempfile::TempDir;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_auditscope"))
}

#[test]
fn test_no_subcommand_prints_usage() {
    let temp = TempDir::new().unwrap();
    let output = binary()
        .env("AUDITSCOPE_HOME", temp.path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("Usage"), "no usage text: {}", text);
    assert!(text.contains("mcp"));
    assert!(text.contains("setup"));
}

#[test]
fn test_setup_fails_without_cluster_cli() {
    let temp = TempDir::new().unwrap();
    // An empty PATH guarantees the probes cannot find a shell or the CLI.
    let output = binary()
        .arg("setup")
        .env("AUDITSCOPE_HOME", temp.path())
        .env("PATH", temp.path())
        .output()
        .unwrap();

    assert!(!output.status.success(), "setup must fail without the CLI");
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("FAIL"), "no failure marker: {}", text);
}

#[test]
fn test_mcp_mode_speaks_jsonrpc_on_stdout() {
    use std::io::Write;
    use std::process::Stdio;

    let temp = TempDir::new().unwrap();
    let mut child = binary()
        .arg("mcp")
        .arg("--audit-trail")
        .arg(temp.path().join("trail.json"))
        .env("AUDITSCOPE_HOME", temp.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let request = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;
    child
        .stdin
        .take()
        .unwrap()
        .write_all(format!("{}\n", request).as_bytes())
        .unwrap();
    // Closing stdin ends the serve loop.

    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().next().expect("one response line");
    let response: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert!(response.get("error").is_none());
}
