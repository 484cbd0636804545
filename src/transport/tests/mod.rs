//! Tests for remote transports.

use std::cell::RefCell;
use std::rc::Rc;

use rstest::{fixture, rstest};

use super::*;
use crate::test_support::{ScriptedRunner, tool_config};


#[fixture]
fn runner() -> ScriptedRunner {
    ScriptedRunner::new()
}

#[derive(Debug, Default)]
struct CountingSession {
    closes: Rc<RefCell<u32>>,
    fail_close: bool,
}

impl RemoteSession for CountingSession {
    fn target(&self) -> &str {
        "counting"
    }

    fn execute(&mut self, _command: &str) -> Result<RemoteOutput, TransportError> {
        Ok(RemoteOutput::default())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        *self.closes.borrow_mut() += 1;
        if self.fail_close {
            return Err(TransportError::Connection {
                target: String::from("counting"),
                message: String::from("close failed"),
            });
        }
        Ok(())
    }
}

#[rstest]
fn guard_closes_session_on_drop() {
    let closes = Rc::new(RefCell::new(0));
    {
        let _guard = SessionGuard::new(Box::new(CountingSession {
            closes: Rc::clone(&closes),
            fail_close: false,
        }));
    }
    assert_eq!(*closes.borrow(), 1);
}

#[rstest]
fn explicit_close_is_not_repeated_on_drop() {
    let closes = Rc::new(RefCell::new(0));
    let guard = SessionGuard::new(Box::new(CountingSession {
        closes: Rc::clone(&closes),
        fail_close: true,
    }));

    let err = guard.close().expect_err("close failure should surface");

    assert!(matches!(err, TransportError::Connection { .. }));
    assert_eq!(*closes.borrow(), 1);
}

#[rstest]
fn error_text_ignores_whitespace_only_stderr() {
    let quiet = RemoteOutput {
        stderr: String::from(" \n\t"),
        ..RemoteOutput::default()
    };
    let noisy = RemoteOutput {
        stderr: String::from("  app not found\n"),
        ..RemoteOutput::default()
    };

    assert_eq!(quiet.error_text(), None);
    assert_eq!(noisy.error_text(), Some("app not found"));
}

#[rstest]
fn connection_targets_describe_themselves() {
    let shell = ConnectionTarget::RemoteShell(RemoteShellTarget {
        host: String::from("cloud.example.org"),
        port: Some(2222),
        user: Some(String::from("admin")),
        ..RemoteShellTarget::default()
    });
    let pod = ConnectionTarget::OrchestratorExec(PodTarget {
        selector: String::from("app=owncloud"),
        namespace: Some(String::from("cloud")),
        ..PodTarget::default()
    });

    assert_eq!(shell.to_string(), "ssh admin@cloud.example.org:2222");
    assert_eq!(
        pod.to_string(),
        "kubectl pod matching app=owncloud in namespace cloud"
    );
}

#[rstest]
fn shell_target_debug_redacts_password() {
    let target = RemoteShellTarget {
        host: String::from("h"),
        password: Some(String::from("hunter2")),
        ..RemoteShellTarget::default()
    };

    assert!(!format!("{target:?}").contains("hunter2"));
}

#[rstest]
fn process_transport_dispatches_on_target_kind(runner: ScriptedRunner) {
    runner.push_success();
    let transport = ProcessTransport::new(runner.clone(), tool_config());

    let session = transport
        .open(&ConnectionTarget::RemoteShell(RemoteShellTarget {
            host: String::from("cloud.example.org"),
            ..RemoteShellTarget::default()
        }))
        .expect("ssh session should open");

    assert_eq!(session.target(), "ssh cloud.example.org");
    let programs: Vec<String> = transport
        .runner()
        .invocations()
        .into_iter()
        .map(|invocation| invocation.program)
        .collect();
    assert_eq!(programs, vec![String::from("ssh")]);
}
