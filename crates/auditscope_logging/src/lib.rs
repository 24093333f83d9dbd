//! Logging setup shared by the Auditscope binaries.
//!
//! Two tracing layers: a size-capped file under the auditscope home, and
//! stderr. When a binary serves MCP over stdio, stdout belongs to the
//! protocol, so the console layer stays on stderr and is quieted to
//! warnings unless verbose output was asked for.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "auditscope=info,auditscope_core=info,auditscope_mcp=info";

/// A log file may grow to this many bytes before it is swapped out.
const MAX_LOG_BYTES: u64 = 8 * 1024 * 1024;

/// Logging configuration for one binary invocation.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
    /// Serving MCP over stdio: keep the console quiet, stdout untouched.
    pub stdio_mode: bool,
}

/// Initialize tracing with the file sink and a stderr layer.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let dir = ensure_logs_dir()?;
    let sink = LogSink::open(dir.join(format!("{}.log", config.app_name)), MAX_LOG_BYTES)
        .with_context(|| format!("Failed to open log file for {}", config.app_name))?;

    let env_filter =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let stderr_filter = if config.stdio_mode && !config.verbose {
        EnvFilter::new("warn")
    } else {
        env_filter()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(sink)
                .with_ansi(false)
                .with_filter(env_filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .init();

    Ok(())
}

/// The Auditscope home directory: ~/.auditscope, or wherever
/// AUDITSCOPE_HOME points.
pub fn auditscope_home() -> PathBuf {
    std::env::var("AUDITSCOPE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .expect("Could not determine home directory")
                .join(".auditscope")
        })
}

/// The logs directory under the home, created on demand.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let dir = auditscope_home().join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Size-capped append-only log sink.
///
/// A generation that fills up is renamed to `<file>.log.old`, replacing
/// the previous one, and writing restarts on a fresh file. At most two
/// generations sit on disk, which bounds usage without a rotation chain
/// to maintain. Clones share the same file handle.
#[derive(Clone)]
pub struct LogSink {
    state: Arc<Mutex<SinkState>>,
}

struct SinkState {
    path: PathBuf,
    file: File,
    written: u64,
    cap: u64,
}

impl LogSink {
    fn open(path: PathBuf, cap: u64) -> io::Result<Self> {
        let file = append_handle(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            state: Arc::new(Mutex::new(SinkState {
                path,
                file,
                written,
                cap,
            })),
        })
    }

    fn locked(&self) -> io::Result<std::sync::MutexGuard<'_, SinkState>> {
        self.state
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink lock poisoned"))
    }
}

impl SinkState {
    /// Retire the current generation and start a fresh one.
    fn swap_generation(&mut self) -> io::Result<()> {
        self.file.flush()?;
        fs::rename(&self.path, self.path.with_extension("log.old"))?;
        self.file = append_handle(&self.path)?;
        self.written = 0;
        Ok(())
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.locked()?;
        // An oversized single record is written anyway; the swap happens on
        // the next one.
        if state.written > 0 && state.written + buf.len() as u64 > state.cap {
            state.swap_generation()?;
        }
        let n = state.file.write(buf)?;
        state.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.locked()?.file.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn append_handle(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sink_swaps_full_generation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.log");
        let mut sink = LogSink::open(path.clone(), 64).unwrap();

        sink.write_all(&[b'a'; 60]).unwrap();
        sink.write_all(&[b'b'; 30]).unwrap();
        sink.flush().unwrap();

        let old = temp.path().join("app.log.old");
        assert_eq!(fs::read(&old).unwrap(), vec![b'a'; 60]);
        assert_eq!(fs::read(&path).unwrap(), vec![b'b'; 30]);
    }

    #[test]
    fn test_sink_appends_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.log");

        {
            let mut sink = LogSink::open(path.clone(), 1024).unwrap();
            sink.write_all(b"first\n").unwrap();
        }
        let mut sink = LogSink::open(path.clone(), 1024).unwrap();
        sink.write_all(b"second\n").unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_swap_replaces_previous_old_generation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.log");
        let mut sink = LogSink::open(path.clone(), 16).unwrap();

        sink.write_all(&[b'a'; 10]).unwrap();
        sink.write_all(&[b'b'; 10]).unwrap(); // retires the a's
        sink.write_all(&[b'c'; 10]).unwrap(); // retires the b's
        sink.flush().unwrap();

        let old = temp.path().join("app.log.old");
        assert_eq!(fs::read(&old).unwrap(), vec![b'b'; 10]);
        assert_eq!(fs::read(&path).unwrap(), vec![b'c'; 10]);
    }

    #[test]
    fn test_oversized_record_still_lands() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.log");
        let mut sink = LogSink::open(path.clone(), 8).unwrap();

        sink.write_all(&[b'x'; 100]).unwrap();
        sink.flush().unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 100);
    }
}
