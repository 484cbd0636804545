//! Install orchestration across the server inventory.
//!
//! Servers are handled one at a time. For each entry the orchestrator picks
//! a transport, opens a session, sends the configuration sequence, resolves
//! the public address, closes the session, and appends a domain record to
//! the descriptor it owns. The first fatal error ends the run; entries
//! without a connection mode are skipped.

use crate::credentials::{CredentialPair, SecretGenerator};
use crate::descriptor::{Descriptor, DomainRecord};
use crate::inventory::{InstallConfig, InvalidEntry, ServerEntry};
use crate::runner::{resolve_address, run_sequence};
use crate::templates::CommandContext;
use crate::transport::{
    ConnectionTarget, RemoteSession, SessionFactory, SessionGuard, TransportError,
};

mod error;

pub use error::InstallError;

/// Asks the operator for an address discovery could not determine.
pub trait AddressPrompt {
    /// Returns the address entered for `server`, or `None` when the operator
    /// supplied nothing.
    fn ask(&self, server: &str) -> Option<String>;
}

impl<F> AddressPrompt for F
where
    F: Fn(&str) -> Option<String>,
{
    fn ask(&self, server: &str) -> Option<String> {
        self(server)
    }
}

/// Result of a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct InstallOutcome {
    /// Descriptor with one appended record per configured server.
    pub descriptor: Descriptor,
    /// Names of the configured servers, in order.
    pub configured: Vec<String>,
    /// Entries skipped for lacking a connection mode.
    pub skipped: Vec<InvalidEntry>,
}

/// Drives the per-server install workflow.
#[derive(Debug)]
pub struct InstallOrchestrator<F, G, P> {
    sessions: F,
    secrets: G,
    prompt: P,
}

impl<F, G, P> InstallOrchestrator<F, G, P>
where
    F: SessionFactory,
    G: SecretGenerator,
    P: AddressPrompt,
{
    /// Creates an orchestrator from its collaborators.
    #[must_use]
    pub const fn new(sessions: F, secrets: G, prompt: P) -> Self {
        Self {
            sessions,
            secrets,
            prompt,
        }
    }

    /// Configures every server in `config` and records the results in
    /// `descriptor`, which is returned inside the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError`] for the first server that cannot be
    /// connected to, rejects a command, or yields no address.
    pub fn execute(
        &self,
        config: &InstallConfig,
        mut descriptor: Descriptor,
    ) -> Result<InstallOutcome, InstallError> {
        let mut configured = Vec::new();
        let mut skipped = Vec::new();

        for entry in &config.servers {
            let target = match config.target_for(entry) {
                Ok(target) => target,
                Err(invalid) => {
                    tracing::warn!(server = %entry.name, "{invalid}");
                    skipped.push(invalid);
                    continue;
                }
            };

            let record = self.configure(config, entry, &target)?;
            descriptor
                .append(&record)
                .map_err(|source| InstallError::Descriptor {
                    server: entry.name.clone(),
                    source,
                })?;
            tracing::info!(server = %entry.name, address = %record.address, "server configured");
            configured.push(entry.name.clone());
        }

        tracing::info!(
            configured = configured.len(),
            skipped = skipped.len(),
            "install finished"
        );
        Ok(InstallOutcome {
            descriptor,
            configured,
            skipped,
        })
    }

    fn configure(
        &self,
        config: &InstallConfig,
        entry: &ServerEntry,
        target: &ConnectionTarget,
    ) -> Result<DomainRecord, InstallError> {
        let server = entry.name.as_str();
        let credentials = CredentialPair::generate(&self.secrets);
        let context = CommandContext::new(
            &config.install_path_for(entry),
            config.oauthname(),
            &credentials,
            config.rds_domain().unwrap_or_default(),
        );

        tracing::info!(server, %target, "connecting");
        let session = self
            .sessions
            .open(target)
            .map_err(|source| InstallError::Connection {
                server: server.to_owned(),
                source,
            })?;
        let mut guard = SessionGuard::new(session);
        let discovered = configure_remote(guard.session(), &context).map_err(|source| {
            InstallError::RemoteCommand {
                server: server.to_owned(),
                source,
            }
        })?;
        if let Err(err) = guard.close() {
            tracing::warn!(server, error = %err, "failed to close session");
        }

        let address = if discovered.is_empty() {
            tracing::warn!(server, "public address could not be determined");
            self.prompt
                .ask(server)
                .map(|answer| answer.trim().to_owned())
                .filter(|answer| !answer.is_empty())
                .ok_or_else(|| InstallError::UnresolvedAddress {
                    server: server.to_owned(),
                })?
        } else {
            discovered
        };

        DomainRecord::new(server, &address, &credentials).map_err(|source| {
            InstallError::Descriptor {
                server: server.to_owned(),
                source,
            }
        })
    }
}

fn configure_remote<S>(session: &mut S, context: &CommandContext) -> Result<String, TransportError>
where
    S: RemoteSession + ?Sized,
{
    run_sequence(session, &context.command_sequence())?;
    resolve_address(session, &context.diagnostics())
}
