//! Audit Trail - Append-Only Lifecycle Recording
//!
//! Every query lifecycle event is appended to a line-delimited JSON file,
//! created on demand with its parent directories. Writes are serialised by
//! a mutex and fsync'd before returning, so the trail does not lie if the
//! process is killed. Failure to open the file at startup is non-fatal: the
//! trail degrades to disabled and the server continues.

use crate::types::QueryResult;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::warn;

/// Default trail location, overridable via `AUDIT_TRAIL_PATH`.
pub const DEFAULT_TRAIL_PATH: &str = "./logs/audit_trail.json";

#[derive(Debug, Error)]
pub enum TrailError {
    #[error("failed to serialize trail entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write trail entry: {0}")]
    Write(#[from] std::io::Error),
}

/// Lifecycle action tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailAction {
    QueryGeneration,
    QueryExecution,
    QueryParsing,
    CompleteQuery,
    CacheHit,
    CacheMiss,
    CacheSet,
    CacheDelete,
    CacheClear,
}

/// One append-only trail record. Never mutated after the append.
#[derive(Debug, Clone, Serialize)]
pub struct TrailEntry {
    pub timestamp: DateTime<Utc>,
    pub query_id: String,
    pub action: TrailAction,
    pub parameters: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl TrailEntry {
    pub fn new(action: TrailAction, query_id: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            query_id: query_id.into(),
            action,
            parameters: BTreeMap::new(),
            result: None,
            error: None,
            execution_time_ms: 0,
        }
    }

    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_result(mut self, result: &QueryResult) -> Self {
        self.result = Some(result.clone());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        let error = error.into();
        if !error.is_empty() {
            self.error = Some(error);
        }
        self
    }

    pub fn with_execution_time(mut self, ms: u64) -> Self {
        self.execution_time_ms = ms;
        self
    }
}

/// The append-only trail file. Disabled when the file could not be opened.
#[derive(Debug)]
pub struct AuditTrail {
    path: PathBuf,
    writer: Option<Mutex<File>>,
}

impl AuditTrail {
    /// Open (or create) the trail file, preserving existing content. On
    /// failure the trail silently degrades to disabled; the failure is
    /// logged once here.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match open_append(&path) {
            Ok(file) => Self {
                path,
                writer: Some(Mutex::new(file)),
            },
            Err(e) => {
                warn!(
                    "Audit trail disabled, could not open {}: {}",
                    path.display(),
                    e
                );
                Self { path, writer: None }
            }
        }
    }

    /// A trail that records nothing.
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            writer: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry: serialise, write the line, fsync. A single append
    /// is atomic with respect to other appends.
    pub fn append(&self, entry: &TrailEntry) -> Result<(), TrailError> {
        let writer = match &self.writer {
            Some(writer) => writer,
            None => return Ok(()),
        };

        let line = serde_json::to_string(entry)?;
        let mut file = writer.lock().expect("trail lock poisoned");
        writeln!(file, "{}", line)?;
        file.sync_data()?;
        Ok(())
    }

    /// Append, logging rather than propagating failure. The trail is
    /// observability, not control flow.
    pub fn record(&self, entry: &TrailEntry) {
        if let Err(e) = self.append(entry) {
            warn!("Failed to append audit trail entry: {}", e);
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}
