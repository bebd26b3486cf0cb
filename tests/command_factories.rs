//! Command line construction for each shell dialect, and per-OS selection.

use pretty_assertions::assert_eq;

use clirun::{
    CliCommandError, CommandFactory, DirectCommandFactory, OsDependentCommandFactory, OsPlatform,
    ShellCommandFactory,
};

fn text(factory: &dyn CommandFactory, command: &str, arguments: &str) -> String {
    factory
        .build(command, Some(arguments))
        .unwrap_or_else(|err| panic!("failed to build `{command}`: {err}"))
        .text()
}

#[test]
fn dialects_render_expected_command_lines() {
    let cases: [(&dyn CommandFactory, &str); 5] = [
        (&DirectCommandFactory, "dotnet build -c Release"),
        (&ShellCommandFactory::sh(), "sh -c \"dotnet build -c Release\""),
        (&ShellCommandFactory::bash(), "bash -c \"dotnet build -c Release\""),
        (&ShellCommandFactory::cmd(), "cmd /c dotnet build -c Release"),
        (&ShellCommandFactory::sudo(), "sudo dotnet build -c Release"),
    ];

    for (factory, expected) in cases {
        assert_eq!(text(factory, "dotnet", "build -c Release"), expected);
    }
}

#[test]
fn posix_quotes_are_escaped_but_cmd_quotes_are_not() {
    let arguments = "commit -m \"fix: tests\"";
    assert_eq!(
        text(&ShellCommandFactory::bash(), "git", arguments),
        r#"bash -c "git commit -m \"fix: tests\"""#
    );
    assert_eq!(
        text(&ShellCommandFactory::cmd(), "git", arguments),
        r#"cmd /c git commit -m "fix: tests""#
    );
}

#[test]
fn create_builds_an_unstarted_command() {
    let command = ShellCommandFactory::sh()
        .create("ls", Some("-la"))
        .expect("create");
    assert_eq!(command.command_text(), "sh -c \"ls -la\"");
    assert!(command.id().is_none());
    assert!(!command.is_disposed());
}

#[test]
fn presets_pick_cmd_on_windows_only() {
    let windows = OsDependentCommandFactory::for_platform(OsPlatform::Windows)
        .use_for_os(OsPlatform::Windows, ShellCommandFactory::cmd())
        .use_for_other_os(ShellCommandFactory::bash());
    let linux = OsDependentCommandFactory::for_platform(OsPlatform::Linux)
        .use_for_os(OsPlatform::Windows, ShellCommandFactory::cmd())
        .use_for_other_os(ShellCommandFactory::bash());

    assert_eq!(text(&windows, "make", "all"), "cmd /c make all");
    assert_eq!(text(&linux, "make", "all"), "bash -c \"make all\"");
}

#[test]
fn current_os_preset_matches_platform() {
    let factory = OsDependentCommandFactory::use_cmd_for_windows_and_sh_for_others();
    let expected = if cfg!(windows) {
        "cmd /c echo hi"
    } else {
        "sh -c \"echo hi\""
    };
    assert_eq!(text(&factory, "echo", "hi"), expected);
    assert!(factory.is_shell());
}

#[test]
fn missing_registration_is_a_configuration_error() {
    let factory = OsDependentCommandFactory::for_platform(OsPlatform::MacOs)
        .use_for_os(OsPlatform::Linux, ShellCommandFactory::sh());
    let err = factory
        .build("ls", None)
        .expect_err("no factory for macos");
    assert!(matches!(err, CliCommandError::NoMatchingShell { .. }));
    assert!(err.to_string().contains("`macos`"));
}
