//! Environment self-check for the `setup` subcommand.
//!
//! Each check runs the same executor the MCP server uses, so a pass here
//! means the serving path works too. Checks degrade in order: a CLI that is
//! missing fails everything after it quickly.

use anyhow::Result;
use auditscope_core::{CommandExecutor, LogSource};
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

struct Check {
    label: &'static str,
    command: String,
}

pub fn run() -> Result<ExitCode> {
    let checks = [
        Check {
            label: "cluster CLI present",
            command: "oc version --client".to_string(),
        },
        Check {
            label: "cluster reachable",
            command: "oc whoami".to_string(),
        },
        Check {
            label: "audit log readable",
            command: format!(
                "oc adm node-logs --role=master --path={} | head -1",
                LogSource::KubeApiserver.live_log_path()
            ),
        },
    ];

    // Setup probes should not hang a terminal for the full serving ceiling.
    let executor = CommandExecutor::with_timeout(Duration::from_secs(15));
    let mut failed = 0usize;

    println!("auditscope setup");
    for check in &checks {
        match executor.execute(&check.command) {
            Ok(output) => {
                info!("setup check passed: {}", check.label);
                println!("  ok   {}", check.label);
                let first_line = output.lines().next().unwrap_or_default();
                if !first_line.is_empty() {
                    println!("       {}", truncate(first_line, 100));
                }
            }
            Err(e) => {
                failed += 1;
                println!("  FAIL {}: {}", check.label, e);
                let captured = e.captured_output();
                if !captured.is_empty() {
                    println!("       {}", truncate(captured.lines().next().unwrap_or_default(), 100));
                }
            }
        }
    }

    if failed == 0 {
        println!("all checks passed");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{} of {} checks failed", failed, checks.len());
        Ok(ExitCode::FAILURE)
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
