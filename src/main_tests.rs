//! Unit tests for the `rds-install` CLI binary implementation.

use super::*;
use rstest::rstest;
use tempfile::TempDir;

fn install_args(dir: &TempDir, values: Option<&str>, only_kubeconfig: bool) -> InstallCommand {
    let path = dir.path().join("values.yaml");
    if let Some(contents) = values {
        std::fs::write(&path, contents).expect("seed values file");
    }
    InstallCommand {
        values_file: path.to_string_lossy().into_owned(),
        config: None,
        only_kubeconfig,
    }
}

#[rstest]
fn write_commands_prints_placeholder_sequence() {
    let mut buf = Vec::new();

    write_commands(&mut buf);

    let rendered = String::from_utf8(buf).expect("utf8");
    assert!(rendered.starts_with("Conditions:"));
    assert!(rendered.contains("${OWNCLOUD_PATH}occ market:install oauth2"));
}

#[rstest]
fn write_error_writes_cli_error() {
    let mut buf = Vec::new();
    let err = CliError::Inventory(InventoryError::NoServers);

    write_error(&mut buf, &err);

    let rendered = String::from_utf8(buf).expect("utf8");
    assert!(
        rendered.starts_with("inventory error: no servers were found"),
        "rendered: {rendered}"
    );
}

#[rstest]
fn dispatch_get_commands_succeeds() {
    assert!(dispatch(Cli::GetCommands).is_ok());
}

#[rstest]
fn missing_values_file_is_a_descriptor_error() {
    let dir = TempDir::new().expect("temp dir");

    let err = run_install(&install_args(&dir, None, false)).expect_err("file is absent");

    assert!(matches!(err, CliError::Descriptor(DescriptorError::Io { .. })), "unexpected: {err}");
}

#[rstest]
#[case::no_servers("rds: rds.example.org\n", false, InventoryError::NoServers)]
#[case::no_rds("servers:\n  - name: a\n    address: h\n", false, InventoryError::MissingRdsDomain)]
#[case::no_selector("rds: rds.example.org\n", true, InventoryError::MissingSelector)]
fn inventory_problems_stop_before_any_connection(
    #[case] values: &str,
    #[case] only_kubeconfig: bool,
    #[case] expected: InventoryError,
) {
    let dir = TempDir::new().expect("temp dir");

    let err = run_install(&install_args(&dir, Some(values), only_kubeconfig))
        .expect_err("inventory should be rejected");

    assert!(
        matches!(err, CliError::Inventory(ref inner) if *inner == expected),
        "unexpected: {err}"
    );
}
