//! Tool settings loaded via `ortho-config`.
//!
//! These settings describe the local environment the installer runs in
//! (which clients to spawn, how strictly to check host keys, how long an
//! exec may take). The inventory of servers lives in the values file and is
//! handled by [`crate::inventory`].

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default timeout applied to each orchestrator exec call.
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

/// Default SSH connect timeout.
pub const DEFAULT_SSH_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Client binaries and transport settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "RDS_INSTALL",
    discovery(
        app_name = "rds-install",
        env_var = "RDS_INSTALL_CONFIG_PATH",
        config_file_name = "rds-install.toml",
        dotfile_name = ".rds-install.toml",
        project_file_name = "rds-install.toml"
    )
)]
pub struct ToolConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `sshpass` executable, used only for password logins.
    #[ortho_config(default = "sshpass".to_owned())]
    pub sshpass_bin: String,
    /// Path to the `kubectl` executable.
    #[ortho_config(default = "kubectl".to_owned())]
    pub kubectl_bin: String,
    /// Whether unknown or changed host keys abort the connection.
    #[ortho_config(default = true)]
    pub ssh_strict_host_key_checking: bool,
    /// Known hosts file override; the system trust store is used when unset.
    pub ssh_known_hosts_file: Option<String>,
    /// Seconds to wait for the SSH handshake.
    #[ortho_config(default = DEFAULT_SSH_CONNECT_TIMEOUT_SECS)]
    pub ssh_connect_timeout_secs: u64,
    /// Seconds a single `kubectl exec` may run before it is killed.
    #[ortho_config(default = DEFAULT_EXEC_TIMEOUT_SECS)]
    pub exec_timeout_secs: u64,
}

impl ToolConfig {
    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when merging sources fails, or
    /// [`ConfigError::MissingField`] when validation fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        let config = Self::load_from_iter([OsString::from("rds-install")])
            .map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Ensures every binary is named and every timeout is positive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] naming the offending field and
    /// how to set it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.sshpass_bin, "sshpass_bin")?;
        Self::require_value(&self.kubectl_bin, "kubectl_bin")?;
        if let Some(path) = self.ssh_known_hosts_file.as_deref() {
            Self::require_value(path, "ssh_known_hosts_file")?;
        }
        Self::require_positive(self.ssh_connect_timeout_secs, "ssh_connect_timeout_secs")?;
        Self::require_positive(self.exec_timeout_secs, "exec_timeout_secs")?;
        Ok(())
    }

    /// Timeout applied to orchestrator exec calls.
    #[must_use]
    pub const fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec_timeout_secs)
    }

    fn require_value(value: &str, field: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(field_hint(field)));
        }
        Ok(())
    }

    fn require_positive(value: u64, field: &str) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::MissingField(field_hint(field)));
        }
        Ok(())
    }
}

fn field_hint(field: &str) -> String {
    format!(
        "{field}: set RDS_INSTALL_{} or add {field} to rds-install.toml",
        field.to_uppercase()
    )
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or zero.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn base_config() -> ToolConfig {
        crate::test_support::tool_config()
    }

    #[rstest]
    fn defaults_validate(base_config: ToolConfig) {
        assert!(base_config.validate().is_ok());
    }

    #[rstest]
    #[case::ssh_bin("ssh_bin")]
    #[case::kubectl_bin("kubectl_bin")]
    #[case::known_hosts("ssh_known_hosts_file")]
    #[case::exec_timeout("exec_timeout_secs")]
    fn validate_names_the_offending_field(base_config: ToolConfig, #[case] field: &str) {
        let config = match field {
            "ssh_bin" => ToolConfig {
                ssh_bin: String::from("  "),
                ..base_config
            },
            "kubectl_bin" => ToolConfig {
                kubectl_bin: String::new(),
                ..base_config
            },
            "ssh_known_hosts_file" => ToolConfig {
                ssh_known_hosts_file: Some(String::new()),
                ..base_config
            },
            _ => ToolConfig {
                exec_timeout_secs: 0,
                ..base_config
            },
        };

        let err = config.validate().expect_err("config should be rejected");

        let ConfigError::MissingField(message) = err else {
            panic!("expected MissingField, got {err:?}");
        };
        assert!(message.starts_with(field), "message: {message}");
        assert!(
            message.contains(&format!("RDS_INSTALL_{}", field.to_uppercase())),
            "message should name the environment variable: {message}"
        );
    }

    #[rstest]
    fn exec_timeout_converts_seconds(base_config: ToolConfig) {
        let config = ToolConfig {
            exec_timeout_secs: 3,
            ..base_config
        };
        assert_eq!(config.exec_timeout(), Duration::from_secs(3));
    }
}
