//! `kubectl exec` transport.
//!
//! The session lists running pods matching a label selector, probes them in
//! order, and binds to the first one that accepts an exec channel. Commands
//! run through `/bin/bash -c` inside that pod with a per-call timeout.

use serde::Deserialize;

use super::{
    PodTarget, RemoteOutput, RemoteSession, TransportError, command_error, connection_error,
    process_failure,
};
use crate::config::ToolConfig;
use crate::process::{CommandRunner, Invocation};
use crate::templates::redact;

const PROBE_COMMAND: &str = "true";

// Written by kubectl itself whenever the remote command exits non-zero.
const EXIT_NOTICE_PREFIX: &str = "command terminated with exit code ";

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMetadata,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
}

/// Session bound to a single running pod.
#[derive(Debug)]
pub struct PodSession<'r, R> {
    runner: &'r R,
    config: &'r ToolConfig,
    target: PodTarget,
    pod: String,
    description: String,
    open: bool,
}

impl<'r, R: CommandRunner> PodSession<'r, R> {
    /// Selects the first running pod matching `target` that accepts exec.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] when pods cannot be listed, no
    /// running pod matches, or none of the matches accepts an exec channel.
    pub fn open(
        runner: &'r R,
        config: &'r ToolConfig,
        target: &PodTarget,
    ) -> Result<Self, TransportError> {
        let selection = format!("kubectl pods matching {}", target.selector);
        if target.selector.trim().is_empty() {
            return Err(connection_error(&selection, "no label selector configured"));
        }

        let listing = Invocation::new(&config.kubectl_bin)
            .args(scope_args(target))
            .args([
                "get",
                "pods",
                "-l",
                target.selector.as_str(),
                "--field-selector",
                "status.phase=Running",
                "-o",
                "json",
            ])
            .timeout(Some(config.exec_timeout()));
        let output = runner
            .run(&listing)
            .map_err(|err| connection_error(&selection, &err.to_string()))?;
        if !output.is_success() {
            return Err(connection_error(
                &selection,
                &format!("listing pods failed: {}", output.stderr.trim()),
            ));
        }

        let candidates = parse_pod_names(&output.stdout)
            .map_err(|message| connection_error(&selection, &message))?;
        if candidates.is_empty() {
            return Err(connection_error(&selection, "no running pod found"));
        }

        for pod in candidates {
            let session = Self {
                runner,
                config,
                target: target.clone(),
                description: format!("kubectl pod {pod}"),
                pod,
                open: true,
            };
            match runner.run(&session.exec_invocation(PROBE_COMMAND)) {
                Ok(probe) if probe.is_success() => {
                    tracing::debug!(pod = %session.pod, "pod accepted exec channel");
                    return Ok(session);
                }
                Ok(probe) => {
                    tracing::debug!(pod = %session.pod, stderr = %probe.stderr.trim(), "pod rejected exec probe");
                }
                Err(err) => {
                    tracing::debug!(pod = %session.pod, error = %err, "pod exec probe failed");
                }
            }
        }

        Err(connection_error(
            &selection,
            "no running pod accepted an exec channel",
        ))
    }

    /// Name of the pod this session is bound to.
    #[must_use]
    pub fn pod(&self) -> &str {
        &self.pod
    }

    fn exec_invocation(&self, command: &str) -> Invocation {
        let mut invocation = Invocation::new(&self.config.kubectl_bin)
            .args(scope_args(&self.target))
            .args(["exec", self.pod.as_str()]);
        if let Some(container) = self.target.container.as_deref() {
            invocation = invocation.args(["-c", container]);
        }
        invocation
            .args(["--", "/bin/bash", "-c", command])
            .timeout(Some(self.config.exec_timeout()))
    }
}

impl<R: CommandRunner> RemoteSession for PodSession<'_, R> {
    fn target(&self) -> &str {
        &self.description
    }

    fn execute(&mut self, command: &str) -> Result<RemoteOutput, TransportError> {
        if !self.open {
            return Err(command_error(&self.description, command, "session is closed"));
        }
        tracing::debug!(session = %self.description, command = %redact(command), "running remote command");
        self.runner
            .run(&self.exec_invocation(command))
            .map(RemoteOutput::from)
            .map(without_exit_notice)
            .map_err(|err| process_failure(&self.description, command, &err))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.open {
            self.open = false;
            tracing::debug!(session = %self.description, "pod session released");
        }
        Ok(())
    }
}

/// Drops kubectl's own exit-code notice from stderr so only the remote
/// command's error stream is judged; the exit code is kept.
fn without_exit_notice(mut output: RemoteOutput) -> RemoteOutput {
    if output.stderr.contains(EXIT_NOTICE_PREFIX) {
        output.stderr = output
            .stderr
            .lines()
            .filter(|line| !is_exit_notice(line))
            .collect::<Vec<_>>()
            .join("\n");
    }
    output
}

fn is_exit_notice(line: &str) -> bool {
    line.trim()
        .strip_prefix(EXIT_NOTICE_PREFIX)
        .is_some_and(|code| !code.is_empty() && code.chars().all(|ch| ch.is_ascii_digit()))
}

fn scope_args(target: &PodTarget) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(context) = target.context.as_deref() {
        args.push(String::from("--context"));
        args.push(context.to_owned());
    }
    if let Some(namespace) = target.namespace.as_deref() {
        args.push(String::from("-n"));
        args.push(namespace.to_owned());
    }
    args
}

fn parse_pod_names(json: &str) -> Result<Vec<String>, String> {
    let list: PodList = serde_json::from_str(json)
        .map_err(|err| format!("unexpected pod listing: {err}"))?;
    Ok(list
        .items
        .into_iter()
        .map(|pod| pod.metadata.name)
        .collect())
}
