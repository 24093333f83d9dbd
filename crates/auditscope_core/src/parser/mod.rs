//! Parser - Tolerant Line-Oriented Audit Event Decoding
//!
//! Decodes newline-delimited audit events into typed records. Three
//! strategies exist, tried in order when chaining is enabled:
//!
//! 1. `json`: strict decode against the known wire schema.
//! 2. `structured-fallback`: a defensive walk over loosely-typed JSON,
//!    absorbing shape drift (string status codes, odd annotation values).
//! 3. `grep-fallback`: last-resort field extraction from the raw text,
//!    which also understands the key-value lines the jq formatter emits.
//!
//! Malformed lines never abort a batch; they are absorbed into the error
//! counter and the bounded error list. The parser never panics on
//! adversarial input.

mod record;
mod strategies;

pub use record::{AuditRecord, DECISION_ANNOTATION, REASON_ANNOTATION};

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default cap on a single line, bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 100 * 1024;
/// Default cap on accumulated error strings per batch.
pub const DEFAULT_MAX_PARSE_ERRORS: usize = 1000;

/// Decoding strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseStrategy {
    #[default]
    Json,
    StructuredFallback,
    GrepFallback,
}

impl ParseStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ParseStrategy::Json => "json",
            ParseStrategy::StructuredFallback => "structured-fallback",
            ParseStrategy::GrepFallback => "grep-fallback",
        }
    }

    /// The next strategy in the chain, if any.
    fn next(&self) -> Option<ParseStrategy> {
        match self {
            ParseStrategy::Json => Some(ParseStrategy::StructuredFallback),
            ParseStrategy::StructuredFallback => Some(ParseStrategy::GrepFallback),
            ParseStrategy::GrepFallback => None,
        }
    }
}

/// Parser configuration.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Lines longer than this are counted as errors, not decoded.
    pub max_line_length: usize,
    /// Cap on accumulated error strings.
    pub max_parse_errors: usize,
    /// First strategy to try.
    pub strategy: ParseStrategy,
    /// Whether to fall through to the next strategy on failure.
    pub chain_strategies: bool,
    /// Optional wall-clock ceiling for one batch.
    pub batch_timeout: Option<Duration>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_parse_errors: DEFAULT_MAX_PARSE_ERRORS,
            strategy: ParseStrategy::Json,
            chain_strategies: true,
            batch_timeout: None,
        }
    }
}

/// How many lines each strategy decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyBreakdown {
    pub json: usize,
    pub structured_fallback: usize,
    pub grep_fallback: usize,
}

impl StrategyBreakdown {
    fn count(&mut self, strategy: ParseStrategy) {
        match strategy {
            ParseStrategy::Json => self.json += 1,
            ParseStrategy::StructuredFallback => self.structured_fallback += 1,
            ParseStrategy::GrepFallback => self.grep_fallback += 1,
        }
    }
}

/// Per-batch performance accounting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ParsePerformance {
    pub elapsed_ms: u64,
    pub lines_per_second: f64,
    pub mean_line_length: f64,
}

/// The result of one batch: records plus accounting.
///
/// Invariants: `total_lines = decoded_lines + error_lines` and
/// `records.len() == decoded_lines`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub records: Vec<AuditRecord>,
    pub total_lines: usize,
    pub decoded_lines: usize,
    pub error_lines: usize,
    pub by_strategy: StrategyBreakdown,
    /// Accumulated error strings, capped at `max_parse_errors`.
    pub errors: Vec<String>,
    pub performance: ParsePerformance,
    /// `decoded / total`, zero for an empty batch.
    pub accuracy: f64,
}

/// Line-oriented audit event parser.
#[derive(Debug)]
pub struct AuditLogParser {
    config: ParserConfig,
    grep: strategies::GrepExtractor,
}

impl AuditLogParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            grep: strategies::GrepExtractor::new(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a whole captured output. Blank lines are skipped before any
    /// accounting; they are neither decoded nor errored.
    pub fn parse(&self, raw: &str) -> ParseOutcome {
        let started = Instant::now();
        let mut outcome = ParseOutcome::default();
        let mut byte_total = 0usize;

        for (index, line) in raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
        {
            if let Some(budget) = self.config.batch_timeout {
                if started.elapsed() > budget {
                    outcome.total_lines += 1;
                    outcome.error_lines += 1;
                    self.push_error(
                        &mut outcome,
                        format!(
                            "line {}: batch budget of {}ms exhausted, remaining lines skipped",
                            index + 1,
                            budget.as_millis()
                        ),
                    );
                    break;
                }
            }

            outcome.total_lines += 1;
            byte_total += line.len();

            if line.len() > self.config.max_line_length {
                outcome.error_lines += 1;
                self.push_error(
                    &mut outcome,
                    format!(
                        "line {}: exceeds maximum length ({} > {})",
                        index + 1,
                        line.len(),
                        self.config.max_line_length
                    ),
                );
                continue;
            }

            match self.parse_line(line) {
                Ok((record, strategy)) => {
                    outcome.decoded_lines += 1;
                    outcome.by_strategy.count(strategy);
                    outcome.records.push(record);
                }
                Err(failures) => {
                    outcome.error_lines += 1;
                    for failure in failures {
                        self.push_error(&mut outcome, format!("line {}: {}", index + 1, failure));
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        outcome.performance = ParsePerformance {
            elapsed_ms: elapsed.as_millis() as u64,
            lines_per_second: if elapsed.as_secs_f64() > 0.0 {
                outcome.total_lines as f64 / elapsed.as_secs_f64()
            } else {
                0.0
            },
            mean_line_length: if outcome.total_lines > 0 {
                byte_total as f64 / outcome.total_lines as f64
            } else {
                0.0
            },
        };
        outcome.accuracy = if outcome.total_lines > 0 {
            outcome.decoded_lines as f64 / outcome.total_lines as f64
        } else {
            0.0
        };

        debug!(
            "Parsed batch: {} lines, {} decoded, {} errored",
            outcome.total_lines, outcome.decoded_lines, outcome.error_lines
        );
        outcome
    }

    /// Try the configured strategy on one line, chaining on failure when
    /// enabled. Failures of every attempted strategy are returned.
    fn parse_line(&self, line: &str) -> Result<(AuditRecord, ParseStrategy), Vec<String>> {
        let mut failures = Vec::new();
        let mut strategy = Some(self.config.strategy);

        while let Some(current) = strategy {
            match self.try_strategy(current, line) {
                Ok(mut record) => {
                    record.parse_errors = failures.clone();
                    return Ok((record, current));
                }
                Err(failure) => {
                    failures.push(format!("{}: {}", current.name(), failure));
                }
            }
            strategy = if self.config.chain_strategies {
                current.next()
            } else {
                None
            };
        }

        Err(failures)
    }

    fn try_strategy(&self, strategy: ParseStrategy, line: &str) -> Result<AuditRecord, String> {
        match strategy {
            ParseStrategy::Json => strategies::parse_strict(line),
            ParseStrategy::StructuredFallback => strategies::parse_structured(line),
            ParseStrategy::GrepFallback => self.grep.parse(line),
        }
    }

    fn push_error(&self, outcome: &mut ParseOutcome, error: String) {
        if outcome.errors.len() < self.config.max_parse_errors {
            outcome.errors.push(error);
        }
    }
}

impl Default for AuditLogParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"kind":"Event","apiVersion":"audit.k8s.io/v1","level":"Metadata","auditID":"1","stage":"ResponseComplete","requestURI":"/api/v1/pods","verb":"list","user":{"username":"admin","uid":"u1","groups":["system:masters"]},"objectRef":{"resource":"pods","namespace":"default"},"responseStatus":{"code":200},"requestReceivedTimestamp":"2024-03-14T10:00:00Z","annotations":{"authorization.k8s.io/decision":"allow"}}"#;

    fn parser() -> AuditLogParser {
        AuditLogParser::default()
    }

    #[test]
    fn test_empty_input_is_empty_outcome() {
        let outcome = parser().parse("");
        assert_eq!(outcome.total_lines, 0);
        assert_eq!(outcome.decoded_lines, 0);
        assert_eq!(outcome.error_lines, 0);
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.accuracy, 0.0);
    }

    #[test]
    fn test_mixed_batch_accounting() {
        let raw = format!("{}\nnot json at all ###\n{}\n", VALID, VALID);
        let outcome = parser().parse(&raw);

        assert_eq!(outcome.total_lines, 3);
        assert_eq!(outcome.decoded_lines, 2);
        assert_eq!(outcome.error_lines, 1);
        assert_eq!(outcome.records.len(), 2);
        assert!(!outcome.errors.is_empty());
        assert_eq!(
            outcome.total_lines,
            outcome.decoded_lines + outcome.error_lines
        );
    }

    #[test]
    fn test_blank_lines_not_counted() {
        let raw = format!("\n\n{}\n\n", VALID);
        let outcome = parser().parse(&raw);
        assert_eq!(outcome.total_lines, 1);
        assert_eq!(outcome.decoded_lines, 1);
    }

    #[test]
    fn test_strict_decode_attributed_to_json_strategy() {
        let outcome = parser().parse(VALID);
        assert_eq!(outcome.by_strategy.json, 1);
        assert_eq!(outcome.by_strategy.structured_fallback, 0);
        assert_eq!(outcome.records[0].username, "admin");
        assert_eq!(outcome.records[0].raw_line, VALID);
    }

    #[test]
    fn test_shape_drift_falls_through_to_structured() {
        // Status code as a string fails the strict schema.
        let line = r#"{"verb":"get","user":{"username":"admin"},"responseStatus":{"code":"403"},"requestReceivedTimestamp":"2024-03-14T10:00:00Z"}"#;
        let outcome = parser().parse(line);

        assert_eq!(outcome.decoded_lines, 1);
        assert_eq!(outcome.by_strategy.structured_fallback, 1);
        let record = &outcome.records[0];
        assert_eq!(record.status_code, Some(403));
        assert!(!record.parse_errors.is_empty());
        assert!(record.parse_errors[0].starts_with("json:"));
    }

    #[test]
    fn test_formatted_lines_fall_through_to_grep() {
        let line = "timestamp: 2024-03-14T10:00:00Z | username: admin | verb: delete | resource: pods | namespace: default | name: web-1 | statusCode: 200 | statusMessage:  | requestURI: /api/v1/pods | userAgent: kubectl | sourceIPs: 10.0.0.1";
        let outcome = parser().parse(line);

        assert_eq!(outcome.decoded_lines, 1);
        assert_eq!(outcome.by_strategy.grep_fallback, 1);
        let record = &outcome.records[0];
        assert_eq!(record.username, "admin");
        assert_eq!(record.verb, "delete");
        assert_eq!(record.status_code, Some(200));
    }

    #[test]
    fn test_chaining_disabled_stops_at_first_strategy() {
        let parser = AuditLogParser::new(ParserConfig {
            chain_strategies: false,
            ..Default::default()
        });
        let line = r#"{"verb":"get","responseStatus":{"code":"403"}}"#;
        let outcome = parser.parse(line);
        assert_eq!(outcome.decoded_lines, 0);
        assert_eq!(outcome.error_lines, 1);
    }

    #[test]
    fn test_oversized_line_is_an_error() {
        let parser = AuditLogParser::new(ParserConfig {
            max_line_length: 32,
            ..Default::default()
        });
        let outcome = parser.parse(VALID);
        assert_eq!(outcome.error_lines, 1);
        assert!(outcome.errors[0].contains("maximum length"));
    }

    #[test]
    fn test_error_list_capped() {
        let parser = AuditLogParser::new(ParserConfig {
            max_parse_errors: 5,
            ..Default::default()
        });
        let raw = "garbage ###\n".repeat(50);
        let outcome = parser.parse(&raw);
        assert_eq!(outcome.error_lines, 50);
        assert_eq!(outcome.errors.len(), 5);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let raw = format!("{}\nbroken ###\n", VALID);
        let a = parser().parse(&raw);
        let b = parser().parse(&raw);
        assert_eq!(a.records, b.records);
        assert_eq!(a.total_lines, b.total_lines);
        assert_eq!(a.errors, b.errors);
    }

    #[test]
    fn test_adversarial_input_never_panics() {
        let parser = parser();
        for raw in [
            "{",
            "}",
            "null",
            "[]",
            "123",
            "\"string\"",
            "{\"user\":123}",
            "{\"annotations\":[1,2]}",
            "\u{0}\u{1}\u{2}",
            "{\"verb\":",
        ] {
            let _ = parser.parse(raw);
        }
    }

    #[test]
    fn test_performance_block_populated() {
        let raw = format!("{}\n", VALID).repeat(10);
        let outcome = parser().parse(&raw);
        assert!(outcome.performance.mean_line_length > 0.0);
        assert_eq!(outcome.accuracy, 1.0);
    }
}
