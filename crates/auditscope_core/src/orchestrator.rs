//! Result Orchestrator - generate, cache-lookup, execute, parse
//!
//! Drives one query through its lifecycle and keeps the tracked result
//! syntactically complete at every exit: each phase merges its failure into
//! `QueryResult.error` rather than raising, so callers always receive a
//! whole result. Phase entries land in the audit trail in lifecycle order;
//! the complete operation appends its own terminal entry whatever the
//! outcome.

use crate::cache::QueryCache;
use crate::compiler::PipelineCompiler;
use crate::executor::{CommandExecutor, ExecutionError};
use crate::filters::FilterMode;
use crate::parser::{AuditLogParser, ParserConfig};
use crate::summary::summarize;
use crate::trail::{AuditTrail, TrailAction, TrailEntry};
use crate::types::{QueryParameters, QueryResult};
use crate::validator::Validator;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Soft cap on raw output entering the cache, bytes.
pub const MAX_RAW_OUTPUT_BYTES: usize = 1024 * 1024;
/// Soft cap on parsed records entering the cache.
pub const MAX_PARSED_RECORDS: usize = 100_000;

/// The query lifecycle engine.
pub struct QueryEngine {
    validator: Validator,
    compiler: PipelineCompiler,
    executor: CommandExecutor,
    parser: AuditLogParser,
    cache: Arc<QueryCache>,
    trail: Arc<AuditTrail>,
}

impl QueryEngine {
    pub fn new(cache: Arc<QueryCache>, trail: Arc<AuditTrail>) -> Self {
        Self {
            validator: Validator::new(),
            compiler: PipelineCompiler::default(),
            executor: CommandExecutor::new(),
            parser: AuditLogParser::default(),
            cache,
            trail,
        }
    }

    /// Swap the filter mode the compiler emits.
    pub fn with_filter_mode(mut self, mode: FilterMode) -> Self {
        self.compiler = PipelineCompiler::new(mode);
        self
    }

    /// Swap the executor; the test seam for deadlines.
    pub fn with_executor(mut self, executor: CommandExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Swap the parser configuration.
    pub fn with_parser_config(mut self, config: ParserConfig) -> Self {
        self.parser = AuditLogParser::new(config);
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn trail(&self) -> &Arc<AuditTrail> {
        &self.trail
    }

    // ------------------------------------------------------------------
    // Phases
    // ------------------------------------------------------------------

    /// Phase 1: assign identity, admit parameters, compile, inspect.
    pub fn generate(&self, params: &QueryParameters) -> QueryResult {
        let started = Instant::now();
        let mut result = QueryResult::new();

        match self.validator.admit(params) {
            Ok(()) => match self.compiler.compile(params) {
                Some(command) => match self.validator.inspect_pipeline(&command) {
                    Ok(()) => {
                        debug!("Generated query {}: {}", result.query_id, command);
                        result.command = command;
                    }
                    Err(e) => result.record_error(e.to_string()),
                },
                None => {
                    result.record_error(format!("invalid log_source: {}", params.log_source))
                }
            },
            Err(e) => result.record_error(e.to_string()),
        }

        let elapsed = started.elapsed().as_millis() as u64;
        result.execution_time_ms += elapsed;

        self.trail.record(
            &TrailEntry::new(TrailAction::QueryGeneration, result.query_id.clone())
                .with_parameters(params.to_map())
                .with_error(result.error.clone())
                .with_execution_time(elapsed),
        );

        result
    }

    /// Phase 3: run the compiled pipeline, capturing combined output. The
    /// pipeline is re-inspected first so a caller-supplied command cannot
    /// bypass the safety gate.
    pub fn execute(&self, result: &mut QueryResult, params: &QueryParameters) {
        let started = Instant::now();

        if result.command.is_empty() {
            result.record_error("no command to execute");
        } else if let Err(e) = self.validator.inspect_pipeline(&result.command) {
            result.record_error(e.to_string());
        } else {
            match self.executor.execute(&result.command) {
                Ok(output) => result.raw_output = output,
                Err(e) => {
                    // Partial output still aids diagnosis, notably after a
                    // deadline kill.
                    result.raw_output = e.captured_output().to_string();
                    result.record_error(e.to_string());
                    if matches!(e, ExecutionError::Timeout { .. }) {
                        warn!("Query {} hit the execution deadline", result.query_id);
                    }
                }
            }
        }

        let elapsed = started.elapsed().as_millis() as u64;
        result.execution_time_ms += elapsed;

        self.trail.record(
            &TrailEntry::new(TrailAction::QueryExecution, result.query_id.clone())
                .with_parameters(params.to_map())
                .with_error(result.error.clone())
                .with_execution_time(elapsed),
        );
    }

    /// Phase 4: decode the captured output into records and summarise.
    /// Fails only when lines were present and none was decodable.
    pub fn parse(&self, result: &mut QueryResult, params: &QueryParameters) {
        let started = Instant::now();

        let outcome = self.parser.parse(&result.raw_output);
        if outcome.total_lines > 0 && outcome.decoded_lines == 0 {
            result.record_error(format!(
                "failed to parse audit output: none of {} lines decodable",
                outcome.total_lines
            ));
        }
        let (summary, _) = summarize(&outcome.records, &params.to_map());
        result.summary = summary;
        result.records = outcome.records;

        let elapsed = started.elapsed().as_millis() as u64;
        result.execution_time_ms += elapsed;

        self.trail.record(
            &TrailEntry::new(TrailAction::QueryParsing, result.query_id.clone())
                .with_parameters(params.to_map())
                .with_error(result.error.clone())
                .with_execution_time(elapsed),
        );
    }

    // ------------------------------------------------------------------
    // The full lifecycle
    // ------------------------------------------------------------------

    /// generate -> cache lookup -> execute -> parse -> cache write, with a
    /// terminal trail entry whatever the outcome.
    pub fn complete(&self, params: &QueryParameters) -> QueryResult {
        let mut result = self.generate(params);
        if result.has_error() {
            self.record_complete(&result, params);
            return result;
        }

        if let Some(cached) = self.cache.get(&result.query_id) {
            info!("Cache hit for {}", result.query_id);
            self.trail.record(
                &TrailEntry::new(TrailAction::CacheHit, result.query_id.clone())
                    .with_parameters(params.to_map()),
            );
            return cached;
        }

        self.execute(&mut result, params);
        if result.has_error() {
            self.record_complete(&result, params);
            return result;
        }

        self.parse(&mut result, params);
        if result.has_error() {
            self.record_complete(&result, params);
            return result;
        }

        match validate_result(&result, true) {
            Ok(()) => {
                self.cache.set(result.query_id.clone(), result.clone());
                self.trail.record(
                    &TrailEntry::new(TrailAction::CacheSet, result.query_id.clone())
                        .with_parameters(params.to_map()),
                );
            }
            Err(reason) => {
                warn!("Result {} not cached: {}", result.query_id, reason);
            }
        }

        self.record_complete(&result, params);
        result
    }

    fn record_complete(&self, result: &QueryResult, params: &QueryParameters) {
        let mut entry = TrailEntry::new(TrailAction::CompleteQuery, result.query_id.clone())
            .with_parameters(params.to_map())
            .with_error(result.error.clone())
            .with_execution_time(result.execution_time_ms);
        if !result.has_error() {
            entry = entry.with_result(result);
        }
        self.trail.record(&entry);
    }
}

/// Structural checks on a tracked result. The strict flag adds the size
/// caps that gate cache insertion.
pub fn validate_result(result: &QueryResult, strict: bool) -> Result<(), String> {
    if result.query_id.is_empty() {
        return Err("missing query id".to_string());
    }
    if result.command.is_empty() && result.error.is_empty() {
        return Err("neither command nor error populated".to_string());
    }
    if strict {
        if result.raw_output.len() > MAX_RAW_OUTPUT_BYTES {
            return Err(format!(
                "raw output exceeds {} bytes",
                MAX_RAW_OUTPUT_BYTES
            ));
        }
        if result.records.len() > MAX_PARSED_RECORDS {
            return Err(format!("record count exceeds {}", MAX_PARSED_RECORDS));
        }
    }
    Ok(())
}
