//! SSH transport built on an OpenSSH control master.
//!
//! Opening a session starts a background master connection bound to a
//! control socket in a private temporary directory. Every command then
//! multiplexes over that socket, so authentication (including password
//! logins through `sshpass`) happens exactly once per server.

use camino::Utf8PathBuf;
use tempfile::TempDir;

use super::{
    RemoteOutput, RemoteSession, RemoteShellTarget, TransportError, command_error,
    connection_error, process_failure,
};
use crate::config::ToolConfig;
use crate::process::{CommandRunner, Invocation, expand_home};
use crate::templates::redact;

const CONTROL_SOCKET_NAME: &str = "control";
const PASSWORD_ENV: &str = "SSHPASS";

/// Open SSH session multiplexed over a control master.
#[derive(Debug)]
pub struct SshSession<'r, R> {
    runner: &'r R,
    config: &'r ToolConfig,
    description: String,
    destination: String,
    port: Option<u16>,
    control_path: Utf8PathBuf,
    control_dir: Option<TempDir>,
}

impl<'r, R: CommandRunner> SshSession<'r, R> {
    /// Starts the control master for `target`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connection`] when the host is empty, the
    /// control directory cannot be created, or `ssh` fails to authenticate.
    pub fn open(
        runner: &'r R,
        config: &'r ToolConfig,
        target: &RemoteShellTarget,
    ) -> Result<Self, TransportError> {
        let destination = target.destination();
        let description = format!("ssh {destination}");
        if target.host.trim().is_empty() {
            return Err(connection_error(&description, "no address configured"));
        }

        let control_dir = tempfile::Builder::new()
            .prefix("rds-install-ssh-")
            .tempdir()
            .map_err(|err| connection_error(&description, &err.to_string()))?;
        let control_path = Utf8PathBuf::from_path_buf(control_dir.path().join(CONTROL_SOCKET_NAME))
            .map_err(|path| {
                connection_error(
                    &description,
                    &format!("control path {} is not valid UTF-8", path.display()),
                )
            })?;

        let session = Self {
            runner,
            config,
            description,
            destination,
            port: target.port,
            control_path,
            control_dir: Some(control_dir),
        };

        let master = session.master_invocation(target);
        let output = runner
            .run(&master)
            .map_err(|err| connection_error(&session.description, &err.to_string()))?;
        if !output.is_success() {
            let stderr = output.stderr.trim();
            let message = if stderr.is_empty() {
                format!("ssh exited with status {:?}", output.code)
            } else {
                stderr.to_owned()
            };
            return Err(connection_error(&session.description, &message));
        }

        tracing::debug!(session = %session.description, "ssh control master started");
        Ok(session)
    }

    /// Path of the control socket shared by every command of this session.
    #[must_use]
    pub const fn control_path(&self) -> &Utf8PathBuf {
        &self.control_path
    }

    fn master_invocation(&self, target: &RemoteShellTarget) -> Invocation {
        let password = target
            .password
            .as_deref()
            .filter(|password| !password.is_empty());

        let mut args: Vec<String> = vec![
            String::from("-M"),
            String::from("-S"),
            self.control_path.to_string(),
            String::from("-o"),
            String::from("ControlPersist=yes"),
            String::from("-f"),
            String::from("-N"),
            String::from("-o"),
            String::from("LogLevel=ERROR"),
            String::from("-o"),
            format!("ConnectTimeout={}", self.config.ssh_connect_timeout_secs),
            String::from("-o"),
            format!(
                "StrictHostKeyChecking={}",
                if self.config.ssh_strict_host_key_checking {
                    "yes"
                } else {
                    "no"
                }
            ),
        ];
        if let Some(known_hosts) = self.config.ssh_known_hosts_file.as_deref() {
            args.push(String::from("-o"));
            args.push(format!("UserKnownHostsFile={}", expand_home(known_hosts)));
        }
        if password.is_none() {
            args.push(String::from("-o"));
            args.push(String::from("BatchMode=yes"));
        }
        if let Some(key) = target.private_key.as_deref().filter(|key| !key.is_empty()) {
            args.push(String::from("-i"));
            args.push(expand_home(key));
        }
        self.push_port(&mut args);
        args.push(self.destination.clone());

        let Some(secret) = password else {
            return Invocation::new(&self.config.ssh_bin).args(args);
        };
        Invocation::new(&self.config.sshpass_bin)
            .arg("-e")
            .arg(&self.config.ssh_bin)
            .args(args)
            .env(PASSWORD_ENV, secret)
    }

    fn exec_invocation(&self, command: &str) -> Invocation {
        let mut args = vec![
            String::from("-S"),
            self.control_path.to_string(),
            String::from("-o"),
            String::from("ControlMaster=no"),
            String::from("-o"),
            String::from("LogLevel=ERROR"),
        ];
        self.push_port(&mut args);
        args.push(self.destination.clone());
        args.push(command.to_owned());
        Invocation::new(&self.config.ssh_bin).args(args)
    }

    fn exit_invocation(&self) -> Invocation {
        let mut args = vec![
            String::from("-S"),
            self.control_path.to_string(),
            String::from("-O"),
            String::from("exit"),
        ];
        self.push_port(&mut args);
        args.push(self.destination.clone());
        Invocation::new(&self.config.ssh_bin).args(args)
    }

    fn push_port(&self, args: &mut Vec<String>) {
        if let Some(port) = self.port {
            args.push(String::from("-p"));
            args.push(port.to_string());
        }
    }
}

impl<R: CommandRunner> RemoteSession for SshSession<'_, R> {
    fn target(&self) -> &str {
        &self.description
    }

    fn execute(&mut self, command: &str) -> Result<RemoteOutput, TransportError> {
        if self.control_dir.is_none() {
            return Err(command_error(&self.description, command, "session is closed"));
        }
        tracing::debug!(session = %self.description, command = %redact(command), "running remote command");
        self.runner
            .run(&self.exec_invocation(command))
            .map(RemoteOutput::from)
            .map_err(|err| process_failure(&self.description, command, &err))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let Some(control_dir) = self.control_dir.take() else {
            return Ok(());
        };
        let result = self.runner.run(&self.exit_invocation());
        drop(control_dir);

        let output = result.map_err(|err| connection_error(&self.description, &err.to_string()))?;
        if !output.is_success() {
            return Err(connection_error(
                &self.description,
                &format!("control master exit failed: {}", output.stderr.trim()),
            ));
        }
        tracing::debug!(session = %self.description, "ssh control master stopped");
        Ok(())
    }
}
