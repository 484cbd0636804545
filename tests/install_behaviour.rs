//! Behavioural coverage for the install orchestrator over scripted transports.

use std::convert::Infallible;

use camino::Utf8Path;
use rds_install::test_support::{ScriptedRunner, tool_config};
use rds_install::{
    Descriptor, DomainRecord, InstallConfig, InstallError, InstallOrchestrator, InstallOutcome,
    ProcessTransport, SecretGenerator,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

const SSH_INVENTORY: &str = r"
rds: rds.example.org
owncloud_path: /srv/app
servers:
  - name: campus
    address: cloud.example.org
    user: admin
";

const MIXED_INVENTORY: &str = r"
rds: rds.example.org
servers:
  - name: broken
  - name: campus
    address: cloud.example.org
";

#[derive(Clone, Debug)]
struct InstallWorld {
    runner: ScriptedRunner,
    inventory: &'static str,
}

impl InstallWorld {
    fn new(inventory: &'static str) -> Self {
        Self {
            runner: ScriptedRunner::new(),
            inventory,
        }
    }
}

#[derive(Debug)]
struct RunResult {
    result: Result<InstallOutcome, InstallError>,
    remote_commands: Vec<String>,
}

impl RunResult {
    fn outcome(&self) -> &InstallOutcome {
        self.result
            .as_ref()
            .unwrap_or_else(|err| panic!("install should succeed: {err}"))
    }

    fn records(&self) -> Vec<DomainRecord> {
        self.outcome()
            .descriptor
            .domains()
            .iter()
            .map(|value| {
                serde_yaml::from_value(value.clone())
                    .unwrap_or_else(|err| panic!("domain record should parse: {err}"))
            })
            .collect()
    }
}

struct FixedSecrets;

impl SecretGenerator for FixedSecrets {
    fn generate(&self) -> String {
        String::from("0123456789")
    }
}

fn no_prompt(_server: &str) -> Option<String> {
    None
}

#[fixture]
fn world() -> InstallWorld {
    InstallWorld::new(SSH_INVENTORY)
}

#[fixture]
fn run() -> RunResult {
    RunResult {
        result: Err(InstallError::UnresolvedAddress {
            server: String::from("placeholder"),
        }),
        remote_commands: Vec::new(),
    }
}

#[given("an inventory with one ssh server and one entry without connection details")]
fn mixed_inventory(world: InstallWorld) -> Result<InstallWorld, Infallible> {
    world.runner.push_ssh_install("host-a", "");
    Ok(InstallWorld {
        inventory: MIXED_INVENTORY,
        ..world
    })
}

#[given("an ssh server reporting hostname \"{hostname}\" with overrides \"{first}\" and \"{second}\"")]
fn server_with_overrides(
    world: InstallWorld,
    hostname: String,
    first: String,
    second: String,
) -> Result<InstallWorld, Infallible> {
    let overrides = format!(
        "  \"overwritehost\": \"{first}\",\n  \"overwrite.cli.url\": \"https:\\/\\/{second}\\/\",\n"
    );
    world.runner.push_ssh_install(&hostname, &overrides);
    Ok(world)
}

#[given("an ssh server whose third command fails")]
fn server_failing_third_command(world: InstallWorld) -> Result<InstallWorld, Infallible> {
    world.runner.push_success();
    world.runner.push_success();
    world.runner.push_success();
    world.runner.push_failure(1, "App \"oauth2\" cannot be enabled");
    world.runner.push_success();
    Ok(world)
}

#[when("the install runs")]
fn install_runs(world: InstallWorld) -> Result<RunResult, Infallible> {
    let inventory = InstallConfig::from_yaml_str(Utf8Path::new("values.yaml"), world.inventory)
        .unwrap_or_else(|err| panic!("inventory should parse: {err}"));
    let descriptor = Descriptor::from_yaml_str(Utf8Path::new("values.yaml"), "")
        .unwrap_or_else(|err| panic!("descriptor should parse: {err}"));
    let orchestrator = InstallOrchestrator::new(
        ProcessTransport::new(world.runner.clone(), tool_config()),
        FixedSecrets,
        no_prompt,
    );

    let result = orchestrator.execute(&inventory, descriptor);
    Ok(RunResult {
        result,
        remote_commands: world.runner.last_args(),
    })
}

#[then("only \"{name}\" is configured")]
fn only_configured(run: &RunResult, name: String) {
    assert_eq!(run.outcome().configured, [name.clone()]);
    let names: Vec<String> = run.records().into_iter().map(|record| record.name).collect();
    assert_eq!(names, [name]);
}

#[then("\"{name}\" is reported as skipped")]
fn reported_as_skipped(run: &RunResult, name: String) {
    let skipped: Vec<&str> = run
        .outcome()
        .skipped
        .iter()
        .map(|entry| entry.name.as_str())
        .collect();
    assert_eq!(skipped, [name.as_str()]);
}

#[then("the recorded address is \"{address}\"")]
fn recorded_address(run: &RunResult, address: String) {
    let records = run.records();
    let record = records.first().unwrap_or_else(|| panic!("one record expected"));
    assert_eq!(record.address, address);
}

#[then("the run fails naming \"{server}\"")]
fn run_fails_naming(run: &RunResult, server: String) {
    let Err(err) = &run.result else {
        panic!("install should fail");
    };
    assert!(matches!(err, InstallError::RemoteCommand { .. }), "unexpected: {err}");
    assert_eq!(err.server(), server);
    assert!(err.to_string().contains(&server));
}

#[then("no address discovery command was sent")]
fn no_discovery(run: &RunResult) {
    assert!(
        !run.remote_commands
            .iter()
            .any(|command| command.contains("gethostname") || command.contains("config:list")),
        "commands: {:?}",
        run.remote_commands
    );
    assert!(
        !run.remote_commands
            .iter()
            .any(|command| command.contains("app:enable rds")),
        "later commands must not be sent"
    );
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Skip entries without a connection mode"
)]
fn scenario_skip_entries(world: InstallWorld, run: RunResult) {
    let _ = (world, run);
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Prefer the last host override"
)]
fn scenario_override_precedence(world: InstallWorld, run: RunResult) {
    let _ = (world, run);
}

#[scenario(
    path = "tests/features/install.feature",
    name = "Stop at the first failing command"
)]
fn scenario_stop_on_failure(world: InstallWorld, run: RunResult) {
    let _ = (world, run);
}
