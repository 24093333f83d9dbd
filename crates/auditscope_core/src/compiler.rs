//! Pipeline Compiler - Parameters to a Single Shell String
//!
//! Assembles the base CLI invocation, the planned `--path=` targets and the
//! filter stages into one pipeline. Multi-target plans become a
//! parenthesised `&&`-chain with the filters replicated per target, so the
//! chain stops on the first failing sub-pipeline and the executor can
//! observe it.

use crate::filters::{FilterBuilder, FilterMode};
use crate::planner::{self, LogFileTarget};
use crate::timeframe::{TimeWindow, TimeframeResolver};
use crate::types::QueryParameters;
use chrono::{DateTime, Local};

/// Base CLI invocation every pipeline starts from.
pub const BASE_COMMAND: &str = "oc adm node-logs";
/// Role selector carried by every sub-pipeline.
pub const ROLE_ARG: &str = "--role=master";

/// Compiles query parameters into shell pipelines.
#[derive(Debug, Default)]
pub struct PipelineCompiler {
    resolver: TimeframeResolver,
    filters: FilterBuilder,
}

impl PipelineCompiler {
    pub fn new(mode: FilterMode) -> Self {
        Self {
            resolver: TimeframeResolver::new(),
            filters: FilterBuilder::new(mode),
        }
    }

    /// Compile against the current clock.
    pub fn compile(&self, params: &QueryParameters) -> Option<String> {
        self.compile_at(params, Local::now())
    }

    /// Compile against an explicit "now". Returns `None` only when the log
    /// source is not admitted; admission normally rejects that first.
    pub fn compile_at(&self, params: &QueryParameters, now: DateTime<Local>) -> Option<String> {
        let source = params.source()?;

        let window: Option<TimeWindow> = if params.has_timeframe() {
            self.resolver.resolve_at(&params.timeframe, now)
        } else {
            None
        };

        let targets = planner::plan_at(source, window.as_ref(), now);
        let stages = self.filters.build(params, window.as_ref());

        if targets.len() == 1 {
            Some(single_pipeline(&targets[0], &stages))
        } else {
            let chain = targets
                .iter()
                .map(|t| single_pipeline(t, &stages))
                .collect::<Vec<_>>()
                .join(" && ");
            Some(format!("({})", chain))
        }
    }
}

/// One full per-target pipeline: base command, role, path, filter stages.
fn single_pipeline(target: &LogFileTarget, stages: &[String]) -> String {
    let mut command = format!("{} {} {}", BASE_COMMAND, ROLE_ARG, target.path_arg());
    for stage in stages {
        command.push_str(" | ");
        command.push_str(stage);
    }
    command
}
