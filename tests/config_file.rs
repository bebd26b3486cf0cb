//! Loading `ProgramCliConfig` from TOML files on disk.

use assert_fs::TempDir;
use assert_fs::prelude::*;
use pretty_assertions::assert_eq;

use clirun::{
    KillOnDispose, ProgramCli, ProgramCliConfig, ResultValidationRules, ShellSetting,
};

#[test]
fn loads_and_applies_a_config_file() {
    let temp = TempDir::new().expect("temp dir");
    let file = temp.child("clirun.toml");
    file.write_str(
        r#"
        wait_for_exit_timeout_ms = 5000
        result_validation_rules = "zero_exit_code_and_no_error"
        kill_on_dispose = "only_process"
        shell = "os_default"
        "#,
    )
    .expect("write config");

    let config = ProgramCliConfig::load(file.path()).expect("load");
    assert_eq!(config.shell, ShellSetting::OsDefault);
    assert_eq!(config.kill_on_dispose, KillOnDispose::OnlyProcess);

    let cli = ProgramCli::from_config("echo", &config).expect("cli");
    assert!(cli.use_command_shell());
    assert_eq!(
        cli.result_validation_rules(),
        ResultValidationRules::ZeroExitCodeAndNoError
    );
}

#[test]
fn invalid_file_reports_its_path() {
    let temp = TempDir::new().expect("temp dir");
    let file = temp.child("broken.toml");
    file.write_str("max_line_bytes = 0").expect("write config");

    let err = ProgramCliConfig::load(file.path()).expect_err("invalid");
    let message = format!("{err:#}");
    assert!(message.contains("broken.toml"), "{message}");
    assert!(message.contains("max_line_bytes"), "{message}");
}

#[test]
fn missing_file_is_an_error() {
    let temp = TempDir::new().expect("temp dir");
    assert!(ProgramCliConfig::load(&temp.path().join("absent.toml")).is_err());
}

#[cfg(unix)]
#[test]
fn configured_environment_reaches_the_child() {
    let config = ProgramCliConfig::from_toml_str(
        r#"
        shell = "sh"
        [env]
        CLIRUN_GREETING = "hello"
        "#,
    )
    .expect("config");

    let result = ProgramCli::from_config("echo", &config)
        .expect("cli")
        .execute("$CLIRUN_GREETING")
        .expect("run");
    assert_eq!(result.output(), "hello");
}
