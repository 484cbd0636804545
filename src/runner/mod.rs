//! Sequential command execution and public address discovery.

use crate::templates::{CommandSequence, DiagnosticCommands, redact};
use crate::transport::{RemoteOutput, RemoteSession, TransportError};

/// Runs one command and treats any stderr output as a remote failure.
///
/// A non-zero exit code with a silent error stream is accepted, so filters
/// such as `grep` without matches do not abort the run.
///
/// # Errors
///
/// Returns [`TransportError::RemoteCommand`] when the command writes to
/// stderr, ends without an exit status, or cannot be delivered.
pub fn run_checked<S>(session: &mut S, command: &str) -> Result<RemoteOutput, TransportError>
where
    S: RemoteSession + ?Sized,
{
    let output = session.execute(command)?;
    if let Some(message) = output.error_text() {
        return Err(remote_failure(session, command, message));
    }
    if output.exit_code.is_none() {
        return Err(remote_failure(
            session,
            command,
            "terminated without an exit status",
        ));
    }
    Ok(output)
}

/// Sends every command of `commands` in order, stopping at the first
/// failure. Output of successful commands is discarded.
///
/// # Errors
///
/// Returns the first [`TransportError`]; later commands are never sent.
pub fn run_sequence<S>(session: &mut S, commands: &CommandSequence) -> Result<(), TransportError>
where
    S: RemoteSession + ?Sized,
{
    for command in commands.iter() {
        tracing::info!(session = %session.target(), command = %redact(command), "running");
        run_checked(session, command)?;
    }
    Ok(())
}

/// Determines the instance's public address.
///
/// The system hostname is the starting candidate; every non-empty
/// `overwritehost` or `overwrite.cli.url` value listed afterwards replaces
/// it, the last one winning. The result is empty when neither source yields
/// a value.
///
/// # Errors
///
/// Returns [`TransportError::RemoteCommand`] when either diagnostic fails.
pub fn resolve_address<S>(
    session: &mut S,
    diagnostics: &DiagnosticCommands,
) -> Result<String, TransportError>
where
    S: RemoteSession + ?Sized,
{
    let hostname = run_checked(session, &diagnostics.hostname_probe)?;
    let mut address = hostname.stdout.trim().to_owned();

    let overrides = run_checked(session, &diagnostics.override_scan)?;
    for value in overrides.lines().filter_map(parse_override_line) {
        address = value;
    }

    tracing::debug!(session = %session.target(), %address, "resolved public address");
    Ok(address)
}

/// Extracts the host from one `occ config:list` line such as
/// `"overwrite.cli.url": "https:\/\/cloud.example.org\/",`.
///
/// Returns `None` when the line carries no value.
#[must_use]
pub fn parse_override_line(line: &str) -> Option<String> {
    let without_comma = line.replacen(',', "", 1);
    let (_, value) = without_comma.split_once(':')?;
    let unquoted = value
        .trim()
        .trim_matches(|ch: char| ch == '"' || ch == '\'')
        .replace("\\/", "/");
    let host = unquoted
        .strip_prefix("https://")
        .or_else(|| unquoted.strip_prefix("http://"))
        .unwrap_or(&unquoted)
        .trim_end_matches('/')
        .trim();
    (!host.is_empty()).then(|| host.to_owned())
}

fn remote_failure<S>(session: &S, command: &str, message: &str) -> TransportError
where
    S: RemoteSession + ?Sized,
{
    TransportError::RemoteCommand {
        target: session.target().to_owned(),
        command: command.to_owned(),
        message: message.to_owned(),
    }
}

#[cfg(test)]
mod tests;
