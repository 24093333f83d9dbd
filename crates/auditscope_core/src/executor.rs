//! Executor - Bounded Subprocess Execution
//!
//! Runs a compiled pipeline through a POSIX shell so that `|`, `grep`, `jq`
//! and parenthesised `&&` groups are interpreted by the shell. Standard
//! output and standard error are captured together. A wall-clock ceiling
//! bounds every run; on expiry the child is killed and whatever partial
//! output was captured travels with the error. Failures are reported, not
//! retried.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Wall-clock ceiling for one pipeline run.
pub const EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

/// How often the watchdog polls the child for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to wait for drained output after a kill. Orphaned grandchildren
/// can hold the pipe open past the child's death; the deadline must not
/// stretch with them.
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("command execution timed out after {timeout_secs} seconds")]
    Timeout {
        timeout_secs: u64,
        partial_output: String,
    },

    #[error("command exited with {status}: {output}")]
    Failed { status: String, output: String },

    #[error("failed to run shell: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecutionError {
    /// Whatever output was captured before the failure, for diagnosis.
    pub fn captured_output(&self) -> &str {
        match self {
            ExecutionError::Timeout { partial_output, .. } => partial_output,
            ExecutionError::Failed { output, .. } => output,
            ExecutionError::Io(_) => "",
        }
    }
}

/// Runs pipelines under a deadline. Single-shot; the caller blocks until
/// completion or expiry.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new() -> Self {
        Self {
            timeout: EXECUTION_TIMEOUT,
        }
    }

    /// Mainly a test seam; production uses the default ceiling.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the pipeline, returning combined stdout+stderr on success.
    pub fn execute(&self, pipeline: &str) -> Result<String, ExecutionError> {
        debug!("Executing pipeline: {}", pipeline);
        let started = Instant::now();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(pipeline)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout_rx = drain_pipe(child.stdout.take());
        let stderr_rx = drain_pipe(child.stderr.take());

        let status = match self.wait_with_deadline(&mut child, started)? {
            Some(status) => status,
            None => {
                warn!(
                    "Pipeline exceeded {}s ceiling, killing child",
                    self.timeout.as_secs()
                );
                let _ = child.kill();
                let _ = child.wait();
                let partial =
                    join_output(stdout_rx, stderr_rx, Some(KILL_DRAIN_GRACE));
                return Err(ExecutionError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                    partial_output: partial,
                });
            }
        };

        let output = join_output(stdout_rx, stderr_rx, None);
        debug!(
            "Pipeline finished in {}ms with {}",
            started.elapsed().as_millis(),
            status
        );

        if status.success() {
            Ok(output)
        } else {
            Err(ExecutionError::Failed {
                status: status.to_string(),
                output,
            })
        }
    }

    /// Poll until exit or deadline. `Ok(None)` means the deadline passed.
    fn wait_with_deadline(
        &self,
        child: &mut Child,
        started: Instant,
    ) -> Result<Option<std::process::ExitStatus>, ExecutionError> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if started.elapsed() >= self.timeout {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain one pipe on its own thread so a full buffer can never deadlock the
/// watchdog loop. The collected text arrives over a channel once the write
/// end closes.
fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut reader| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = String::new();
            let _ = reader.read_to_string(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Combine the drained streams. With a grace bound, a stream that does not
/// close in time contributes nothing rather than stalling the caller.
fn join_output(
    stdout: Option<Receiver<String>>,
    stderr: Option<Receiver<String>>,
    grace: Option<Duration>,
) -> String {
    let mut combined = recv_stream(stdout, grace);
    combined.push_str(&recv_stream(stderr, grace));
    combined
}

fn recv_stream(rx: Option<Receiver<String>>, grace: Option<Duration>) -> String {
    let rx = match rx {
        Some(rx) => rx,
        None => return String::new(),
    };
    match grace {
        None => rx.recv().unwrap_or_default(),
        Some(grace) => match rx.recv_timeout(grace) {
            Ok(buf) => buf,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => String::new(),
        },
    }
}
