//! Server inventory and global install settings.
//!
//! The inventory is a YAML mapping, usually the same `values.yaml` that
//! receives the generated domain records. Unknown keys are ignored so the
//! deployment descriptor can double as the inventory.

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::files;
use crate::templates::{DEFAULT_OAUTH_NAME, normalise_install_path};
use crate::transport::{ConnectionTarget, PodTarget, RemoteShellTarget};

const KUBECONFIG_ENTRY_NAME: &str = "kubeconfig";

/// Errors raised while loading or validating the inventory.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum InventoryError {
    /// Raised when the inventory file cannot be read.
    #[error("failed to read inventory {path}: {message}")]
    Io {
        /// Inventory path.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// Raised when the inventory is not valid YAML for the expected shape.
    #[error("failed to parse inventory {path}: {message}")]
    Parse {
        /// Inventory path.
        path: Utf8PathBuf,
        /// Parser error string.
        message: String,
    },
    /// Raised when the research data service domain is absent.
    #[error("`rds` must name the research data service domain")]
    MissingRdsDomain,
    /// Raised when two entries share a name.
    #[error("server name `{0}` is used more than once")]
    DuplicateName(String),
    /// Raised when the inventory lists no servers.
    #[error("no servers were found; add entries under `servers` or use --only-kubeconfig")]
    NoServers,
    /// Raised when `--only-kubeconfig` is used without a pod selector.
    #[error("--only-kubeconfig requires `k8sselector` to be set")]
    MissingSelector,
}

/// Global settings plus the list of servers to configure.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct InstallConfig {
    /// Research data service domain the instances are pointed at.
    #[serde(default)]
    pub rds: Option<String>,
    /// OAuth client display name.
    #[serde(default)]
    pub oauthname: Option<String>,
    /// Directory containing `occ`; empty means `occ` is on `PATH`.
    #[serde(default)]
    pub owncloud_path: Option<String>,
    /// Default kubeconfig context for pod entries.
    #[serde(default)]
    pub k8scontext: Option<String>,
    /// Default namespace for pod entries.
    #[serde(default)]
    pub k8snamespace: Option<String>,
    /// Pod selector used by `--only-kubeconfig`.
    #[serde(default)]
    pub k8sselector: Option<String>,
    /// Default container for pod entries.
    #[serde(default)]
    pub k8scontainername: Option<String>,
    /// Servers to configure, in order.
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

/// One instance to configure.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct ServerEntry {
    /// Name recorded in the domain record.
    pub name: String,
    /// SSH host; selects the remote-shell transport.
    #[serde(default)]
    pub address: Option<String>,
    /// SSH port.
    #[serde(default)]
    pub port: Option<u16>,
    /// SSH login user.
    #[serde(default)]
    pub user: Option<String>,
    /// SSH password.
    #[serde(default)]
    pub password: Option<String>,
    /// SSH private key path.
    #[serde(default)]
    pub private_key: Option<String>,
    /// Pod label selector; selects the `kubectl exec` transport.
    #[serde(default)]
    pub selector: Option<String>,
    /// Pod namespace override.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Kubeconfig context override.
    #[serde(default)]
    pub context: Option<String>,
    /// Container override.
    #[serde(default)]
    pub containername: Option<String>,
    /// Install path override.
    #[serde(default)]
    pub owncloud_path: Option<String>,
}

/// An entry that names no usable connection mode. Skipped, not fatal.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("server `{name}` has neither `address` (ssh) nor `selector` (kubectl); skipping")]
pub struct InvalidEntry {
    /// Name of the skipped entry.
    pub name: String,
}

impl InstallConfig {
    /// Reads and parses the inventory at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Io`] or [`InventoryError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, InventoryError> {
        let contents = files::read_utf8(path).map_err(|err| InventoryError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_yaml_str(path, &contents)
    }

    /// Parses inventory YAML; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Parse`] when the document does not match
    /// the expected shape.
    pub fn from_yaml_str(path: &Utf8Path, contents: &str) -> Result<Self, InventoryError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|err| InventoryError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Replaces the server list with a single pod entry built from the
    /// global `k8s*` settings.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::MissingSelector`] when `k8sselector` is
    /// unset or blank.
    pub fn with_kubeconfig_only(self) -> Result<Self, InventoryError> {
        let selector = self
            .k8sselector
            .clone()
            .filter(|selector| !selector.trim().is_empty())
            .ok_or(InventoryError::MissingSelector)?;
        let name = self
            .k8scontext
            .clone()
            .filter(|context| !context.trim().is_empty())
            .unwrap_or_else(|| String::from(KUBECONFIG_ENTRY_NAME));
        let entry = ServerEntry {
            name,
            selector: Some(selector),
            ..ServerEntry::default()
        };
        Ok(Self {
            servers: vec![entry],
            ..self
        })
    }

    /// Checks the invariants the install loop relies on.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::MissingRdsDomain`],
    /// [`InventoryError::NoServers`] or [`InventoryError::DuplicateName`].
    pub fn validate(&self) -> Result<(), InventoryError> {
        self.rds_domain()
            .filter(|domain| !domain.is_empty())
            .ok_or(InventoryError::MissingRdsDomain)?;
        if self.servers.is_empty() {
            return Err(InventoryError::NoServers);
        }
        let mut seen = HashSet::new();
        for entry in &self.servers {
            if !seen.insert(entry.name.as_str()) {
                return Err(InventoryError::DuplicateName(entry.name.clone()));
            }
        }
        Ok(())
    }

    /// Trimmed research data service domain.
    #[must_use]
    pub fn rds_domain(&self) -> Option<&str> {
        self.rds.as_deref().map(str::trim)
    }

    /// OAuth client name, falling back to `sciebo-rds`.
    #[must_use]
    pub fn oauthname(&self) -> &str {
        self.oauthname
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_OAUTH_NAME)
    }

    /// Normalised install path for `entry`; the entry value wins over the
    /// global one.
    #[must_use]
    pub fn install_path_for(&self, entry: &ServerEntry) -> String {
        let raw = entry
            .owncloud_path
            .as_deref()
            .or(self.owncloud_path.as_deref())
            .unwrap_or_default();
        normalise_install_path(raw)
    }

    /// Chooses the transport for `entry`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidEntry`] when the entry sets neither `address` nor
    /// `selector`.
    pub fn target_for(&self, entry: &ServerEntry) -> Result<ConnectionTarget, InvalidEntry> {
        if let Some(host) = present(entry.address.as_deref()) {
            return Ok(ConnectionTarget::RemoteShell(RemoteShellTarget {
                host: host.to_owned(),
                port: entry.port,
                user: present(entry.user.as_deref()).map(str::to_owned),
                password: entry.password.clone().filter(|value| !value.is_empty()),
                private_key: present(entry.private_key.as_deref()).map(str::to_owned),
            }));
        }
        if let Some(selector) = present(entry.selector.as_deref()) {
            return Ok(ConnectionTarget::OrchestratorExec(PodTarget {
                selector: selector.to_owned(),
                namespace: overriding(entry.namespace.as_deref(), self.k8snamespace.as_deref()),
                context: overriding(entry.context.as_deref(), self.k8scontext.as_deref()),
                container: overriding(
                    entry.containername.as_deref(),
                    self.k8scontainername.as_deref(),
                ),
            }));
        }
        Err(InvalidEntry {
            name: entry.name.clone(),
        })
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn overriding(entry: Option<&str>, global: Option<&str>) -> Option<String> {
    present(entry).or_else(|| present(global)).map(str::to_owned)
}
