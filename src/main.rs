//! Binary entry point for the `rds-install` CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use dialoguer::Input;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use rds_install::templates::overview;
use rds_install::{
    AlphanumericSecrets, ConfigError, Descriptor, DescriptorError, InstallConfig, InstallError,
    InstallOrchestrator, InventoryError, ProcessCommandRunner, ProcessTransport, ToolConfig,
};

mod cli;

use cli::{Cli, InstallCommand};

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("inventory error: {0}")]
    Inventory(#[from] InventoryError),
    #[error("values file error: {0}")]
    Descriptor(#[from] DescriptorError),
    #[error("install failed: {0}")]
    Install(#[from] InstallError),
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli {
        Cli::Install(command) => run_install(&command),
        Cli::GetCommands => {
            write_commands(io::stdout());
            Ok(())
        }
    }
}

fn run_install(args: &InstallCommand) -> Result<(), CliError> {
    let tool_config = ToolConfig::load_without_cli_args()?;
    let values_path = Utf8PathBuf::from(&args.values_file);
    let descriptor = Descriptor::load(&values_path)?;

    let inventory_path = args
        .config
        .as_deref()
        .map_or_else(|| values_path.clone(), Utf8PathBuf::from);
    let loaded = InstallConfig::load(&inventory_path)?;
    let inventory = if args.only_kubeconfig {
        loaded.with_kubeconfig_only()?
    } else {
        loaded
    };
    inventory.validate()?;

    let orchestrator = InstallOrchestrator::new(
        ProcessTransport::new(ProcessCommandRunner, tool_config),
        AlphanumericSecrets::default(),
        prompt_for_address,
    );
    let outcome = orchestrator.execute(&inventory, descriptor)?;
    outcome.descriptor.persist()?;

    writeln!(
        io::stderr(),
        "Configured {} server(s), skipped {}. Domain records written to {}.",
        outcome.configured.len(),
        outcome.skipped.len(),
        outcome.descriptor.path(),
    )
    .ok();
    Ok(())
}

fn prompt_for_address(server: &str) -> Option<String> {
    writeln!(
        io::stderr(),
        "The public address of {server} could not be determined."
    )
    .ok();
    Input::<String>::new()
        .with_prompt(format!("Address of {server}"))
        .allow_empty(true)
        .interact_text()
        .ok()
}

fn write_commands(mut target: impl Write) {
    write!(target, "{}", overview()).ok();
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
mod main_tests;
