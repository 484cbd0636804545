//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::config::{DEFAULT_EXEC_TIMEOUT_SECS, DEFAULT_SSH_CONNECT_TIMEOUT_SECS, ToolConfig};
use crate::process::{CommandOutput, CommandRunner, Invocation, ProcessError};
use crate::templates::COMMAND_TEMPLATES;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic `ssh`/`kubectl` outcomes without spawning
/// processes. Every invocation is recorded so tests can assert on the exact
/// commands that reached the transport.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<Result<CommandOutput, ProcessError>>>>,
    invocations: Rc<RefCell<Vec<Invocation>>>,
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.borrow().clone()
    }

    /// Returns the last argument of every recorded invocation, which is the
    /// remote command for `ssh` and `bash -c` style invocations.
    #[must_use]
    pub fn last_args(&self) -> Vec<String> {
        self.invocations
            .borrow()
            .iter()
            .filter_map(|invocation| invocation.args.last())
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Returns how many scripted responses have not been consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses.borrow().len()
    }

    /// Pushes a successful exit status with no output.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32, stderr: impl Into<String>) {
        self.push_output(Some(code), "", stderr);
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(Ok(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }));
    }

    /// Pushes a process-level error such as a timeout.
    pub fn push_error(&self, error: ProcessError) {
        self.responses.borrow_mut().push_back(Err(error));
    }

    /// Queues every reply of a successful SSH install: control master start,
    /// the configuration commands, both address diagnostics, and the master
    /// exit.
    pub fn push_ssh_install(&self, hostname: &str, overrides: &str) {
        self.push_success();
        self.push_configuration_replies(hostname, overrides);
        self.push_success();
    }

    /// Queues the configuration command replies followed by the hostname
    /// probe and override scan output.
    pub fn push_configuration_replies(&self, hostname: &str, overrides: &str) {
        for _ in COMMAND_TEMPLATES {
            self.push_success();
        }
        self.push_stdout(hostname);
        self.push_stdout(overrides);
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ProcessError> {
        self.invocations.borrow_mut().push(invocation.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Err(ProcessError::Spawn {
                    program: invocation.program.clone(),
                    message: String::from("no scripted response available"),
                })
            })
    }
}

/// Tool configuration with the stock client names and defaults.
#[must_use]
pub fn tool_config() -> ToolConfig {
    ToolConfig {
        ssh_bin: String::from("ssh"),
        sshpass_bin: String::from("sshpass"),
        kubectl_bin: String::from("kubectl"),
        ssh_strict_host_key_checking: true,
        ssh_known_hosts_file: None,
        ssh_connect_timeout_secs: DEFAULT_SSH_CONNECT_TIMEOUT_SECS,
        exec_timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
    }
}
