//! Core query engine for Auditscope
//!
//! Mediates between structured query parameters and a cluster audit log
//! subsystem reachable only through `oc adm node-logs`. The crate owns the
//! whole pipeline from parameters to tracked result:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     auditscope_core                          │
//! │                                                              │
//! │  timeframe   │ human expressions -> local (start, end)       │
//! │  planner     │ (source, window) -> bounded --path= fan-out   │
//! │  filters     │ per-field grep / jq stages                    │
//! │  compiler    │ one pipeline, or a parenthesised && chain     │
//! │  validator   │ admission + shell-grammar pipeline inspection │
//! │  executor    │ sh -c under a 30 s wall-clock ceiling         │
//! │  parser      │ strict / structured / grep line decoding      │
//! │  summary     │ one-line summary + status histogram           │
//! │  cache       │ TTL store, atomic hit/miss, background sweep  │
//! │  trail       │ append-only fsync'd JSONL lifecycle record    │
//! │  orchestrator│ generate -> lookup -> execute -> parse        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! 1. **Nothing unsafe reaches the shell:** parameters are admitted against
//!    closed whitelists, and the compiled pipeline is re-inspected by a
//!    quote-aware recogniser before the executor ever sees it.
//!
//! 2. **Results are always whole:** every phase merges failure into the
//!    tracked result instead of raising; callers receive a syntactically
//!    complete `QueryResult` on every path.
//!
//! 3. **Bounded everything:** file fan-out, pattern lists, line length,
//!    error accumulation and subprocess wall-clock all carry hard caps.

pub mod cache;
pub mod compiler;
pub mod executor;
pub mod filters;
pub mod orchestrator;
pub mod parser;
pub mod planner;
pub mod summary;
pub mod timeframe;
pub mod trail;
pub mod types;
pub mod validator;

// Re-exports for convenience
pub use cache::{spawn_sweeper, CacheStats, QueryCache, SweeperHandle, DEFAULT_TTL, SWEEP_INTERVAL};
pub use compiler::{PipelineCompiler, BASE_COMMAND, ROLE_ARG};
pub use executor::{CommandExecutor, ExecutionError, EXECUTION_TIMEOUT};
pub use filters::{FilterBuilder, FilterMode};
pub use orchestrator::{validate_result, QueryEngine, MAX_PARSED_RECORDS, MAX_RAW_OUTPUT_BYTES};
pub use parser::{
    AuditLogParser, AuditRecord, ParseOutcome, ParseStrategy, ParserConfig, StrategyBreakdown,
};
pub use planner::{LogFileTarget, MAX_FILE_TARGETS};
pub use summary::{summarize, StatusClasses};
pub use timeframe::{TimeWindow, TimeframeResolver};
pub use trail::{AuditTrail, TrailAction, TrailEntry, TrailError, DEFAULT_TRAIL_PATH};
pub use types::{LogSource, QueryId, QueryParameters, QueryResult};
pub use validator::{ValidationError, Validator, ADMITTED_RESOURCES, ADMITTED_VERBS};
