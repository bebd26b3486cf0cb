//! End-to-end runs through `ProgramCli`.
//!
//! Covers:
//! - Validation rules on real exit codes and stderr output
//! - Working directory handling
//! - Sync and async execution, timeouts and cancellation
//! - Telemetry events and error reporting

#![cfg(unix)]

use std::sync::{Arc, Once};
use std::time::Duration;

use assert_fs::TempDir;
use assert_fs::prelude::*;
use pretty_assertions::assert_eq;

use clirun::{
    CancellationToken, CliCommandError, KillOnDispose, LINE_SEPARATOR, MemoryErrorReporter,
    MemoryTelemetry, ProgramCli, ProgramCliError, ResultValidationRules, RunEvent,
    ShellCommandFactory,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn sh() -> ProgramCli {
    init_tracing();
    ProgramCli::new("sh").with_wait_for_exit_timeout(Duration::from_secs(10))
}

#[test]
fn execute_captures_both_streams() {
    let result = sh()
        .execute("-c 'echo a; echo b 1>&2'")
        .expect("zero exit code passes");

    assert_eq!(result.output(), "a");
    assert_eq!(result.error(), "b");
    assert!(result.merged_output().contains('a'));
    assert!(result.merged_output().contains('b'));
}

#[test]
fn nonzero_exit_code_fails_validation() {
    let err = sh()
        .execute("-c 'echo partial; exit 4'")
        .expect_err("exit code 4 breaks the default rules");

    let ProgramCliError::Validation { reason, result } = &err else {
        panic!("expected a validation failure, got {err:?}");
    };
    assert_eq!(reason, "The command exited with code 4.");
    assert_eq!(result.exit_code(), 4);
    assert_eq!(result.output(), "partial");

    let message = err.to_string();
    assert!(message.starts_with(&format!(
        "The command exited with code 4.{LINE_SEPARATOR}{LINE_SEPARATOR}CLI command: sh -c 'echo partial; exit 4'"
    )));
    assert!(message.contains(&format!("Exit code: 4{LINE_SEPARATOR}Output:{LINE_SEPARATOR}partial")));
}

#[test]
fn stderr_text_becomes_the_failure_reason() {
    let err = sh()
        .with_result_validation_rules(ResultValidationRules::NoError)
        .execute("-c 'echo deprecated flag 1>&2'")
        .expect_err("stderr output breaks the no-error rule");

    assert!(err.to_string().starts_with("deprecated flag."));
    assert_eq!(err.result().map(|result| result.exit_code()), Some(0));
}

#[test]
fn execute_raw_skips_validation() {
    let result = sh()
        .with_result_validation_rules(ResultValidationRules::ZeroExitCodeAndNoError)
        .execute_raw("-c 'echo oops 1>&2; exit 9'")
        .expect("raw runs never fail validation");
    assert_eq!(result.exit_code(), 9);
    assert_eq!(result.error(), "oops");
}

#[test]
fn runs_in_the_configured_directory() {
    let temp = TempDir::new().expect("temp dir");
    temp.child("marker.txt").write_str("here").expect("marker");

    let result = ProgramCli::new("cat")
        .with_working_directory(temp.path())
        .execute("marker.txt")
        .expect("cat marker");
    assert_eq!(result.output(), "here");
    assert_eq!(result.working_directory(), temp.path());
}

#[test]
fn missing_working_directory_is_a_launch_failure() {
    let temp = TempDir::new().expect("temp dir");
    let missing = temp.path().join("gone");

    let err = ProgramCli::new("echo")
        .with_working_directory(&missing)
        .execute("hi")
        .expect_err("directory does not exist");

    assert!(matches!(
        err,
        ProgramCliError::Command(CliCommandError::LaunchFailed { .. })
    ));
    assert!(err.to_string().ends_with(&format!(
        "CLI command: echo hi{LINE_SEPARATOR}Working directory: {}",
        missing.display()
    )));
}

#[test]
fn shell_factory_runs_through_sh() {
    init_tracing();
    let cli = ProgramCli::new("echo").with_command_factory(ShellCommandFactory::sh());
    assert!(cli.use_command_shell());

    let result = cli.execute("\"quoted words\"").expect("echo through sh");
    assert_eq!(result.command_text(), r#"sh -c "echo \"quoted words\"""#);
    assert_eq!(result.output(), "quoted words");
}

#[test]
fn blocking_timeout_reports_timeout() {
    let err = ProgramCli::new("sleep")
        .with_wait_for_exit_timeout(Duration::from_millis(100))
        .execute("5")
        .expect_err("sleep outlives the timeout");
    assert!(err.is_timeout());
    assert!(err.to_string().contains("CLI command: sleep 5"));
}

#[test]
fn start_hands_out_a_running_command() {
    let command = ProgramCli::new("sleep")
        .with_kill_on_dispose(KillOnDispose::OnlyProcess)
        .start("5")
        .expect("start");
    assert!(command.id().is_some());
    assert!(!command.has_exited());

    let result = command.kill(false).expect("kill");
    assert_ne!(result.exit_code(), 0);
}

#[test]
fn telemetry_records_the_run() {
    let telemetry = Arc::new(MemoryTelemetry::<RunEvent>::new());
    let cli = sh().with_telemetry(telemetry.clone());

    let _ = cli.execute("-c 'exit 2'");

    let events = telemetry.events();
    assert_eq!(events.len(), 3, "{events:?}");
    assert!(matches!(events[0], RunEvent::Started { pid: Some(_), .. }));
    assert!(matches!(events[1], RunEvent::Completed { exit_code: 2, .. }));
    assert!(matches!(
        &events[2],
        RunEvent::ValidationFailed { reason, .. } if reason == "The command exited with code 2."
    ));
}

#[test]
fn failures_are_forwarded_to_the_error_reporter() {
    let reporter = Arc::new(MemoryErrorReporter::new());
    let cli = ProgramCli::new("clirun-definitely-missing").with_error_reporter(reporter.clone());

    let err = cli.execute("").expect_err("missing program");

    let messages = reporter.messages();
    assert_eq!(messages, vec![err.to_string()]);
}

#[tokio::test]
async fn execute_async_returns_result() {
    let result = sh()
        .execute_async("-c 'echo async'")
        .await
        .expect("async run");
    assert_eq!(result.output(), "async");
}

#[tokio::test]
async fn execute_raw_async_skips_validation() {
    let result = sh()
        .execute_raw_async("-c 'exit 1'")
        .await
        .expect("raw async run");
    assert_eq!(result.exit_code(), 1);
}

#[tokio::test]
async fn async_timeout_reports_timeout() {
    init_tracing();
    let err = ProgramCli::new("sleep")
        .with_wait_for_exit_timeout(Duration::from_millis(100))
        .execute_async("5")
        .await
        .expect_err("sleep outlives the timeout");
    assert!(err.is_timeout());
}

#[tokio::test]
async fn cancellation_stops_the_wait() {
    init_tracing();
    let token = CancellationToken::new();
    let canceller = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        })
    };

    let err = ProgramCli::new("sleep")
        .execute_async_with_cancellation("5", &token)
        .await
        .expect_err("cancelled");
    canceller.await.expect("canceller task");
    assert!(err.is_cancelled());
}
