//! Local process execution used by every transport.
//!
//! Both remote transports drive a system client (`ssh`, `sshpass`,
//! `kubectl`). This module wraps process spawning behind [`CommandRunner`] so
//! the transports can be exercised with scripted fakes, and enforces the
//! optional per-invocation timeout the orchestrator-exec path relies on.

use std::ffi::OsString;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

mod util;

pub use util::expand_home;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// A single process invocation: program, arguments, extra environment, and
/// an optional wall-clock limit.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Invocation {
    /// Program to execute, resolved through `PATH` when not absolute.
    pub program: String,
    /// Arguments passed verbatim to the program.
    pub args: Vec<OsString>,
    /// Additional environment variables for the child process.
    pub env: Vec<(String, String)>,
    /// Kill the process and fail once this much time has elapsed.
    pub timeout: Option<Duration>,
}

impl Invocation {
    /// Starts an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends a single argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(values.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the child process.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Sets the optional timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns a shell-like rendering of program and arguments for logs and
    /// assertions. Environment values are never included.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

/// Errors raised while starting or supervising a local process.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProcessError {
    /// Raised when a command cannot be spawned or waited on.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Command that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the process outlives its timeout and is killed.
    #[error("{program} timed out after {seconds}s")]
    Timeout {
        /// Command that was terminated.
        program: String,
        /// Timeout that elapsed, in whole seconds.
        seconds: u64,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs the invocation, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::Spawn`] if the command cannot be started and
    /// [`ProcessError::Timeout`] when it exceeds its timeout.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError>;
}

/// Real command runner that shells out to the host operating system.
///
/// Each invocation runs on a current-thread Tokio runtime so the timeout can
/// race the child without extra threads; callers stay synchronous.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(
            program = %invocation.program,
            args = invocation.args.len(),
            "spawning process"
        );

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| spawn_error(&invocation.program, &err))?;
        runtime.block_on(run_async(invocation))
    }
}

async fn run_async(invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
    let program = invocation.program.as_str();
    let mut child = Command::new(program)
        .args(&invocation.args)
        .envs(invocation.env.iter().map(|(key, value)| (key, value)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| spawn_error(program, &err))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Streams are drained alongside `wait` so a chatty child cannot stall on
    // a full pipe.
    let completion = async {
        let (status, out, err) = tokio::join!(
            child.wait(),
            read_stream(stdout.as_mut()),
            read_stream(stderr.as_mut()),
        );
        status
            .map(|exit| CommandOutput {
                code: exit.code(),
                stdout: out,
                stderr: err,
            })
            .map_err(|wait_err| spawn_error(program, &wait_err))
    };

    let Some(timeout) = invocation.timeout else {
        return completion.await;
    };

    tokio::select! {
        result = completion => result,
        () = tokio::time::sleep(timeout) => {
            child.kill().await.ok();
            Err(ProcessError::Timeout {
                program: program.to_owned(),
                seconds: timeout.as_secs(),
            })
        }
    }
}

async fn read_stream<R>(source: Option<&mut R>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    if let Some(reader) = source {
        reader.read_to_end(&mut buffer).await.ok();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

fn spawn_error(program: &str, err: &std::io::Error) -> ProcessError {
    ProcessError::Spawn {
        program: program.to_owned(),
        message: err.to_string(),
    }
}
