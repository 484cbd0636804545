//! Remote command transports.
//!
//! A [`SessionFactory`] turns a [`ConnectionTarget`] into an open
//! [`RemoteSession`]. Two transports exist: an SSH control-master session
//! for directly reachable hosts and a `kubectl exec` session for instances
//! running in a Kubernetes pod. Both drive the system clients through a
//! [`CommandRunner`], so tests substitute a scripted runner.

use std::fmt;

use thiserror::Error;

use crate::config::ToolConfig;
use crate::process::{CommandOutput, CommandRunner, ProcessError};

mod kubectl;
mod ssh;

pub use kubectl::PodSession;
pub use ssh::SshSession;

/// Connection details for a host reachable over SSH.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct RemoteShellTarget {
    /// Hostname or IP address.
    pub host: String,
    /// SSH port; the client default applies when unset.
    pub port: Option<u16>,
    /// Login user; the client default applies when unset.
    pub user: Option<String>,
    /// Password for `sshpass`; key or agent authentication is used when unset.
    pub password: Option<String>,
    /// Private key path, `~` and `$HOME` prefixes are expanded.
    pub private_key: Option<String>,
}

impl RemoteShellTarget {
    /// Returns `user@host`, or `host` when no user is set.
    #[must_use]
    pub fn destination(&self) -> String {
        let host = self.host.trim();
        self.user
            .as_deref()
            .filter(|user| !user.is_empty())
            .map_or_else(|| host.to_owned(), |user| format!("{user}@{host}"))
    }
}

impl fmt::Debug for RemoteShellTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteShellTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .finish()
    }
}

/// Selection of a running pod to exec into.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PodTarget {
    /// Label selector matching the application pods.
    pub selector: String,
    /// Namespace; the kubeconfig default applies when unset.
    pub namespace: Option<String>,
    /// Kubeconfig context; the current context applies when unset.
    pub context: Option<String>,
    /// Container inside the pod; the pod default applies when unset.
    pub container: Option<String>,
}

/// Where and how to reach one instance.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConnectionTarget {
    /// Connect with `ssh`.
    RemoteShell(RemoteShellTarget),
    /// Connect with `kubectl exec`.
    OrchestratorExec(PodTarget),
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteShell(target) => {
                write!(f, "ssh {}", target.destination())?;
                if let Some(port) = target.port {
                    write!(f, ":{port}")?;
                }
                Ok(())
            }
            Self::OrchestratorExec(target) => {
                write!(f, "kubectl pod matching {}", target.selector)?;
                if let Some(namespace) = target.namespace.as_deref() {
                    write!(f, " in namespace {namespace}")?;
                }
                if let Some(context) = target.context.as_deref() {
                    write!(f, " (context {context})")?;
                }
                Ok(())
            }
        }
    }
}

/// Captured result of one remote command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoteOutput {
    /// Remote standard output.
    pub stdout: String,
    /// Remote standard error.
    pub stderr: String,
    /// Exit code, when the transport reported one.
    pub exit_code: Option<i32>,
}

impl RemoteOutput {
    /// Iterates over stdout lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }

    /// Trimmed stderr, or `None` when the command wrote nothing meaningful
    /// to it.
    #[must_use]
    pub fn error_text(&self) -> Option<&str> {
        Some(self.stderr.trim()).filter(|text| !text.is_empty())
    }
}

impl From<CommandOutput> for RemoteOutput {
    fn from(output: CommandOutput) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.code,
        }
    }
}

/// Errors raised by transports.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when a session cannot be established.
    #[error("cannot connect to {target}: {message}")]
    Connection {
        /// Human-readable target description.
        target: String,
        /// Failure detail.
        message: String,
    },
    /// Raised when a remote command fails or cannot be delivered.
    #[error("command `{command}` failed on {target}: {message}")]
    RemoteCommand {
        /// Human-readable target description.
        target: String,
        /// Command that failed.
        command: String,
        /// Remote stderr or transport failure detail.
        message: String,
    },
}

/// An open connection able to run shell commands on one instance.
pub trait RemoteSession {
    /// Human-readable description of the connected target.
    fn target(&self) -> &str;

    /// Runs `command` through the remote shell and captures its output.
    ///
    /// Implementations report transport failures only; interpreting stderr
    /// and exit codes is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RemoteCommand`] when the command cannot be
    /// delivered, times out, or the session is already closed.
    fn execute(&mut self, command: &str) -> Result<RemoteOutput, TransportError>;

    /// Releases the connection. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] when the transport reports a
    /// failure while tearing down.
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens sessions for connection targets.
pub trait SessionFactory {
    /// Establishes a session with `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] when the target is unreachable
    /// or rejects the connection.
    fn open(&self, target: &ConnectionTarget)
    -> Result<Box<dyn RemoteSession + '_>, TransportError>;
}

/// Session factory backed by the local `ssh` and `kubectl` clients.
#[derive(Clone, Debug)]
pub struct ProcessTransport<R> {
    runner: R,
    config: ToolConfig,
}

impl<R: CommandRunner> ProcessTransport<R> {
    /// Creates a transport that spawns clients through `runner`.
    #[must_use]
    pub const fn new(runner: R, config: ToolConfig) -> Self {
        Self { runner, config }
    }

    /// Returns the underlying command runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> SessionFactory for ProcessTransport<R> {
    fn open(
        &self,
        target: &ConnectionTarget,
    ) -> Result<Box<dyn RemoteSession + '_>, TransportError> {
        match target {
            ConnectionTarget::RemoteShell(shell) => Ok(Box::new(SshSession::open(
                &self.runner,
                &self.config,
                shell,
            )?)),
            ConnectionTarget::OrchestratorExec(pod) => Ok(Box::new(PodSession::open(
                &self.runner,
                &self.config,
                pod,
            )?)),
        }
    }
}

/// Closes the wrapped session when dropped, so every exit path releases the
/// connection.
pub struct SessionGuard<'a> {
    session: Box<dyn RemoteSession + 'a>,
    closed: bool,
}

impl<'a> SessionGuard<'a> {
    /// Takes ownership of an open session.
    #[must_use]
    pub fn new(session: Box<dyn RemoteSession + 'a>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    /// Borrows the guarded session.
    pub fn session(&mut self) -> &mut (dyn RemoteSession + 'a) {
        self.session.as_mut()
    }

    /// Closes the session and reports the outcome.
    ///
    /// # Errors
    ///
    /// Propagates the session's close failure.
    pub fn close(mut self) -> Result<(), TransportError> {
        self.closed = true;
        self.session.close()
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.session.close() {
            tracing::warn!(session = %self.session.target(), error = %err, "failed to close session");
        }
    }
}

impl fmt::Debug for SessionGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("target", &self.session.target())
            .field("closed", &self.closed)
            .finish()
    }
}

fn connection_error(target: &str, message: &str) -> TransportError {
    TransportError::Connection {
        target: target.to_owned(),
        message: message.to_owned(),
    }
}

fn command_error(target: &str, command: &str, message: &str) -> TransportError {
    TransportError::RemoteCommand {
        target: target.to_owned(),
        command: command.to_owned(),
        message: message.to_owned(),
    }
}

fn process_failure(target: &str, command: &str, err: &ProcessError) -> TransportError {
    command_error(target, command, &err.to_string())
}

#[cfg(test)]
mod tests;
