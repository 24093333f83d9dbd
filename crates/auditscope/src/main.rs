//! Auditscope Launcher
//!
//! One binary, two modes:
//! - `mcp`: serve the MCP tools over stdio (the normal deployment)
//! - `setup`: verify the host can actually serve audit queries
//!
//! Running without a subcommand prints usage. Internal tests live in the
//! workspace test suites (`cargo test`), not behind a subcommand.

use anyhow::Result;
use auditscope_logging::LogConfig;
use auditscope_mcp::{McpServer, McpServerConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};

mod setup;

#[derive(Parser, Debug)]
#[command(name = "auditscope", about = "MCP mediator for OpenShift audit logs")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the MCP server (stdio transport)
    ///
    /// Runs a JSON-RPC 2.0 server over stdin/stdout. Register it with an
    /// MCP client as:
    ///   { "command": "auditscope", "args": ["mcp"] }
    Mcp {
        /// Cache entry lifetime in seconds (default: 3600)
        #[arg(long, env = "CACHE_TTL")]
        cache_ttl: Option<u64>,

        /// Audit trail file (default: ./logs/audit_trail.json)
        #[arg(long, env = "AUDIT_TRAIL_PATH")]
        audit_trail: Option<PathBuf>,

        /// Maximum tool response size in bytes (default: 1MB)
        #[arg(long, default_value = "1048576")]
        max_response_bytes: usize,
    },

    /// Verify the environment: cluster CLI on PATH, cluster reachable,
    /// audit log readable
    Setup,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => {
            // Usage, like any other flag error, belongs on stderr.
            use clap::CommandFactory;
            let _ = Cli::command().print_help();
            return ExitCode::SUCCESS;
        }
    };

    let stdio_mode = matches!(command, Commands::Mcp { .. });
    if let Err(e) = auditscope_logging::init_logging(LogConfig {
        app_name: "auditscope",
        verbose: cli.verbose,
        stdio_mode,
    }) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    // Recognised for compatibility with existing deployment env files; the
    // demonstration HTTP endpoint is not part of this build.
    if std::env::var("PORT").is_ok() {
        warn!("PORT is set but no HTTP endpoint is built in; ignoring");
    }

    let outcome = match command {
        Commands::Mcp {
            cache_ttl,
            audit_trail,
            max_response_bytes,
        } => run_mcp(cache_ttl, audit_trail, max_response_bytes),
        Commands::Setup => setup::run(),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_mcp(
    cache_ttl: Option<u64>,
    audit_trail: Option<PathBuf>,
    max_response_bytes: usize,
) -> Result<ExitCode> {
    let mut config = McpServerConfig::from_env();
    if let Some(secs) = cache_ttl {
        config.cache_ttl = Duration::from_secs(secs);
    }
    if let Some(path) = audit_trail {
        config.audit_trail_path = path;
    }
    config.max_response_bytes = max_response_bytes;

    info!(
        "Starting MCP server (cache ttl {}s, trail {})",
        config.cache_ttl.as_secs(),
        config.audit_trail_path.display()
    );

    let mut server = McpServer::new(config);
    server.run()?;
    Ok(ExitCode::SUCCESS)
}
