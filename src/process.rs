//! Blocking subprocess execution with a wall-clock timeout and cancellation.
//!
//! External tools (the extractor and the diff tool) are run through
//! [`Process`], which redirects their output to files, waits in short slices
//! so a [`CancelToken`] can interrupt it, and kills the child when the timeout
//! elapses or the token trips.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use wait_timeout::ChildExt;

/// How often a waiting process checks its cancel token.
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Bytes of stderr kept in a failure report.
const STDERR_TAIL: usize = 2000;

/// Shared flag used to abandon a running pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Errors from running an external process.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Redirect files could not be opened or read
    #[error("I/O error running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The wall-clock timeout elapsed and the child was killed
    #[error("'{program}' timed out after {}s", .after.as_secs_f64())]
    TimedOut { program: String, after: Duration },

    /// The cancel token tripped and the child was killed
    #[error("'{program}' was cancelled")]
    Cancelled { program: String },

    /// The child exited unsuccessfully
    #[error(
        "'{program}' exited with {}: {stderr}",
        .code.map_or_else(|| "a signal".to_string(), |c| format!("status {}", c))
    )]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

impl From<ProcessError> for crate::Error {
    fn from(e: ProcessError) -> Self {
        match e {
            ProcessError::Cancelled { .. } => crate::Error::Cancelled,
            other => crate::Error::ExternalTool(other.to_string()),
        }
    }
}

/// A successfully completed run.
#[derive(Debug, Clone)]
pub struct Completed {
    pub status: ExitStatus,
    pub elapsed: Duration,
}

/// Builder for one external tool invocation.
#[derive(Debug, Clone)]
pub struct Process {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
    timeout: Option<Duration>,
    cancel: Option<CancelToken>,
}

impl Process {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdout: None,
            stderr: None,
            timeout: None,
            cancel: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<Path>) -> Self {
        self.args
            .push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Send stdout to a file (created or truncated).
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Send stderr to a file (created or truncated).
    pub fn stderr_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr = Some(path.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Command line for log output.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn io_err(&self, source: std::io::Error) -> ProcessError {
        ProcessError::Io {
            program: self.program.clone(),
            source,
        }
    }

    fn kill(&self, child: &mut std::process::Child) {
        // The child may already have exited between the poll and the kill.
        let _ = child.kill();
        let _ = child.wait();
    }

    /// Run to completion. Blocks the calling thread.
    pub fn run(&self) -> Result<Completed, ProcessError> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(ProcessError::Cancelled {
                program: self.program.clone(),
            });
        }

        let stdout = match &self.stdout {
            Some(path) => Stdio::from(File::create(path).map_err(|e| self.io_err(e))?),
            None => Stdio::null(),
        };
        // Without a target file stderr still goes somewhere readable for error reports.
        let mut stderr_file = match &self.stderr {
            Some(path) => File::options()
                .create(true)
                .truncate(true)
                .read(true)
                .write(true)
                .open(path),
            None => tempfile::tempfile(),
        }
        .map_err(|e| self.io_err(e))?;
        let stderr = Stdio::from(stderr_file.try_clone().map_err(|e| self.io_err(e))?);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }

        tracing::debug!(command = %self.display(), "spawning external tool");
        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let status = loop {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                self.kill(&mut child);
                return Err(ProcessError::Cancelled {
                    program: self.program.clone(),
                });
            }

            let slice = match self.timeout {
                Some(limit) => {
                    let left = limit.saturating_sub(started.elapsed());
                    if left.is_zero() {
                        self.kill(&mut child);
                        return Err(ProcessError::TimedOut {
                            program: self.program.clone(),
                            after: limit,
                        });
                    }
                    left.min(POLL_SLICE)
                }
                None => POLL_SLICE,
            };

            if let Some(status) = child.wait_timeout(slice).map_err(|e| self.io_err(e))? {
                break status;
            }
        };

        let elapsed = started.elapsed();
        tracing::debug!(
            program = %self.program,
            code = ?status.code(),
            elapsed_ms = elapsed.as_millis() as u64,
            "external tool exited"
        );

        if !status.success() {
            return Err(ProcessError::Failed {
                program: self.program.clone(),
                code: status.code(),
                stderr: read_tail(&mut stderr_file),
            });
        }

        Ok(Completed { status, elapsed })
    }
}

/// Last `STDERR_TAIL` bytes of a file, trimmed. Read errors yield an empty string.
fn read_tail(file: &mut File) -> String {
    let len = file.seek(SeekFrom::End(0)).unwrap_or(0);
    let start = len.saturating_sub(STDERR_TAIL as u64);
    if file.seek(SeekFrom::Start(start)).is_err() {
        return String::new();
    }
    let mut bytes = Vec::new();
    if file.read_to_end(&mut bytes).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).trim().to_string()
}
