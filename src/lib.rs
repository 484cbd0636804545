//! Core library for the `rds-install` tool.
//!
//! The crate configures ownCloud instances for the sciebo research data
//! service. Each server from the inventory is reached over SSH or
//! `kubectl exec`, receives a fixed sequence of `occ` commands that install
//! the OAuth2 and RDS apps and register a fresh OAuth client, and is then
//! probed for its public address. The results are appended as domain
//! records to the deployment descriptor (`values.yaml`).

pub mod config;
pub mod credentials;
pub mod descriptor;
mod files;
pub mod install;
pub mod inventory;
pub mod process;
pub mod runner;
pub mod templates;
pub mod test_support;
pub mod transport;

pub use config::{ConfigError, ToolConfig};
pub use credentials::{AlphanumericSecrets, CredentialPair, SecretGenerator};
pub use descriptor::{Descriptor, DescriptorError, DomainRecord};
pub use install::{AddressPrompt, InstallError, InstallOrchestrator, InstallOutcome};
pub use inventory::{InstallConfig, InvalidEntry, InventoryError, ServerEntry};
pub use process::{CommandOutput, CommandRunner, Invocation, ProcessCommandRunner, ProcessError};
pub use transport::{
    ConnectionTarget, PodTarget, ProcessTransport, RemoteOutput, RemoteSession,
    RemoteShellTarget, SessionFactory, SessionGuard, TransportError,
};
