//! Tests for sequential execution and address resolution.

use std::collections::VecDeque;

use rstest::{fixture, rstest};

use super::*;
use crate::credentials::CredentialPair;
use crate::templates::CommandContext;

#[derive(Debug, Default)]
struct FakeSession {
    replies: VecDeque<RemoteOutput>,
    sent: Vec<String>,
}

impl FakeSession {
    fn reply(mut self, stdout: &str, stderr: &str, exit_code: Option<i32>) -> Self {
        self.replies.push_back(RemoteOutput {
            stdout: stdout.to_owned(),
            stderr: stderr.to_owned(),
            exit_code,
        });
        self
    }

    fn ok(self, stdout: &str) -> Self {
        self.reply(stdout, "", Some(0))
    }
}

impl RemoteSession for FakeSession {
    fn target(&self) -> &str {
        "fake"
    }

    fn execute(&mut self, command: &str) -> Result<RemoteOutput, TransportError> {
        self.sent.push(command.to_owned());
        self.replies
            .pop_front()
            .ok_or_else(|| TransportError::RemoteCommand {
                target: String::from("fake"),
                command: command.to_owned(),
                message: String::from("no reply scripted"),
            })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[fixture]
fn context() -> CommandContext {
    CommandContext::new("/srv/app/", "sciebo-rds", &CredentialPair::new("X", "Y"), "D")
}

#[rstest]
fn hostname_is_used_without_overrides(context: CommandContext) {
    let mut session = FakeSession::default().ok("host-a\n").reply("", "", Some(1));

    let address = resolve_address(&mut session, &context.diagnostics()).expect("resolution");

    assert_eq!(address, "host-a");
}

#[rstest]
fn last_override_wins(context: CommandContext) {
    let listing = concat!(
        "    \"overwritehost\": \"override-1\",\n",
        "    \"overwrite.cli.url\": \"https:\\/\\/override-2\\/\",\n",
    );
    let mut session = FakeSession::default().ok("host-a").ok(listing);

    let address = resolve_address(&mut session, &context.diagnostics()).expect("resolution");

    assert_eq!(address, "override-2");
    assert_eq!(
        session.sent,
        [
            r#"php -r "echo gethostname();""#,
            r#"/srv/app/occ config:list | grep "overwritehost\|overwrite.cli.url""#,
        ]
    );
}

#[rstest]
fn empty_override_values_do_not_replace_the_hostname(context: CommandContext) {
    let mut session = FakeSession::default()
        .ok("host-a")
        .ok("    \"overwritehost\": \"\",\n");

    let address = resolve_address(&mut session, &context.diagnostics()).expect("resolution");

    assert_eq!(address, "host-a");
}

#[rstest]
fn unresolved_address_is_empty(context: CommandContext) {
    let mut session = FakeSession::default().ok("  \n").ok("");

    let address = resolve_address(&mut session, &context.diagnostics()).expect("resolution");

    assert!(address.is_empty());
}

#[rstest]
fn failing_probe_aborts_resolution(context: CommandContext) {
    let mut session = FakeSession::default().reply("", "php: command not found", Some(127));

    let err = resolve_address(&mut session, &context.diagnostics()).expect_err("probe fails");

    assert!(matches!(err, TransportError::RemoteCommand { ref message, .. } if message == "php: command not found"));
    assert_eq!(session.sent.len(), 1);
}

#[rstest]
#[case::host(r#"  "overwritehost": "cloud.example.org","#, Some("cloud.example.org"))]
#[case::url(r#"  "overwrite.cli.url": "https:\/\/cloud.example.org\/","#, Some("cloud.example.org"))]
#[case::http(r#"  "overwrite.cli.url": "http:\/\/cloud.example.org:8080","#, Some("cloud.example.org:8080"))]
#[case::empty(r#"  "overwritehost": "","#, None)]
#[case::no_separator("garbage", None)]
fn override_lines_are_parsed(#[case] line: &str, #[case] expected: Option<&str>) {
    assert_eq!(parse_override_line(line).as_deref(), expected);
}

#[rstest]
fn sequence_runs_in_order(context: CommandContext) {
    let commands = context.command_sequence();
    let mut session = FakeSession::default();
    for _ in 0..commands.len() {
        session = session.ok("done");
    }

    run_sequence(&mut session, &commands).expect("sequence should succeed");

    assert_eq!(session.sent, commands.as_slice());
}

#[rstest]
fn failure_on_third_command_stops_the_sequence(context: CommandContext) {
    let commands = context.command_sequence();
    let mut session = FakeSession::default()
        .ok("")
        .ok("")
        .reply("", "App oauth2 could not be enabled", Some(1))
        .ok("")
        .ok("");

    let err = run_sequence(&mut session, &commands).expect_err("third command fails");

    assert_eq!(
        err,
        TransportError::RemoteCommand {
            target: String::from("fake"),
            command: String::from("/srv/app/occ app:enable oauth2"),
            message: String::from("App oauth2 could not be enabled"),
        }
    );
    assert_eq!(session.sent.len(), 3);
    assert_eq!(session.replies.len(), 2);
}

#[rstest]
fn silent_non_zero_exit_is_accepted() {
    let mut session = FakeSession::default().reply("", "", Some(1));

    let output = run_checked(&mut session, "grep nothing").expect("grep miss is not a failure");

    assert_eq!(output.exit_code, Some(1));
}

#[rstest]
fn missing_exit_status_is_a_failure() {
    let mut session = FakeSession::default().reply("partial", "", None);

    let err = run_checked(&mut session, "occ app:enable rds").expect_err("no exit status");

    assert!(matches!(err, TransportError::RemoteCommand { ref message, .. } if message.contains("exit status")));
}
