//! Command-line interface definitions for the `rds-install` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `rds-install` binary.
#[derive(Debug, Parser)]
#[command(
    name = "rds-install",
    about = "Configure ownCloud instances for sciebo RDS and record them in values.yaml",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Configure every server and append its domain record to the values file.
    #[command(
        name = "install",
        about = "Configure every server and append its domain record to the values file"
    )]
    Install(InstallCommand),
    /// Print the commands run on each instance, with placeholders.
    #[command(
        name = "get-commands",
        about = "Print the commands run on each instance, with placeholders"
    )]
    GetCommands,
}

/// Arguments for the `rds-install install` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct InstallCommand {
    /// Deployment values file that receives the domain records.
    ///
    /// The file must exist. Unless --config is given it also holds the
    /// server inventory (`rds`, `servers`, `k8s*` keys).
    #[arg(value_name = "VALUES_FILE", default_value = "values.yaml")]
    pub(crate) values_file: String,
    /// Read the server inventory from this YAML file instead of the values
    /// file.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub(crate) config: Option<String>,
    /// Ignore `servers` and configure the single pod selected by
    /// `k8sselector` in the current kubeconfig context.
    #[arg(short = 'k', long = "only-kubeconfig")]
    pub(crate) only_kubeconfig: bool,
}
