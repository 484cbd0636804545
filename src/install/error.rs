//! Error types for the install workflow.

use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::transport::TransportError;

/// Errors that abort an install run. Each names the server being handled.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum InstallError {
    /// Raised when no session could be opened.
    #[error("server {server}: connection failed: {source}")]
    Connection {
        /// Inventory name of the server.
        server: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// Raised when a configuration or diagnostic command fails.
    #[error("server {server}: {source}")]
    RemoteCommand {
        /// Inventory name of the server.
        server: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },
    /// Raised when neither discovery nor the operator produced an address.
    #[error("server {server}: public address could not be determined")]
    UnresolvedAddress {
        /// Inventory name of the server.
        server: String,
    },
    /// Raised when the domain record cannot be built or stored.
    #[error("server {server}: {source}")]
    Descriptor {
        /// Inventory name of the server.
        server: String,
        /// Descriptor failure.
        #[source]
        source: DescriptorError,
    },
}

impl InstallError {
    /// Inventory name of the server the run stopped at.
    #[must_use]
    pub fn server(&self) -> &str {
        match self {
            Self::Connection { server, .. }
            | Self::RemoteCommand { server, .. }
            | Self::UnresolvedAddress { server }
            | Self::Descriptor { server, .. } => server,
        }
    }
}
