//! Command factories: turn a logical command plus arguments into the literal
//! program and argument string for a given shell dialect.
//!
//! Factories are pure string transformations and never touch processes.

use std::fmt;
use std::sync::Arc;

use crate::command::CliCommand;
use crate::error::{CliCommandError, CommandContext};
use crate::start_info::CommandLine;

/// Builds the command line for a logical `(command, arguments)` pair.
pub trait CommandFactory: Send + Sync + fmt::Debug {
    fn build(&self, command: &str, arguments: Option<&str>)
    -> Result<CommandLine, CliCommandError>;

    /// Whether commands are routed through a command interpreter.
    fn is_shell(&self) -> bool {
        false
    }

    fn create(&self, command: &str, arguments: Option<&str>) -> Result<CliCommand, CliCommandError> {
        Ok(CliCommand::from_command_line(self.build(command, arguments)?))
    }
}

/// Runs the program directly, without any shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCommandFactory;

impl CommandFactory for DirectCommandFactory {
    fn build(
        &self,
        command: &str,
        arguments: Option<&str>,
    ) -> Result<CommandLine, CliCommandError> {
        Ok(CommandLine::new(command, arguments.unwrap_or_default()))
    }
}

/// Quoting and invocation convention of a command interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellDialect {
    /// `sh`, `bash` and friends: `-c "<command> <args>"` with embedded double
    /// quotes escaped.
    Posix,
    /// Windows `cmd`: `/c <command> <args>`, no escaping.
    Cmd,
    /// `sudo`: `<command> <args>`, no escaping.
    Sudo,
}

/// Runs commands through a shell program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommandFactory {
    shell_program: String,
    shell_arguments: Option<String>,
    dialect: ShellDialect,
}

impl ShellCommandFactory {
    pub fn new(shell_program: impl Into<String>, dialect: ShellDialect) -> Self {
        Self {
            shell_program: shell_program.into(),
            shell_arguments: None,
            dialect,
        }
    }

    /// A POSIX-style shell such as `zsh` or `dash`.
    pub fn unix(shell_program: impl Into<String>) -> Self {
        Self::new(shell_program, ShellDialect::Posix)
    }

    pub fn sh() -> Self {
        Self::unix("sh")
    }

    pub fn bash() -> Self {
        Self::unix("bash")
    }

    pub fn cmd() -> Self {
        Self::new("cmd", ShellDialect::Cmd)
    }

    pub fn sudo() -> Self {
        Self::new("sudo", ShellDialect::Sudo)
    }

    /// Arguments placed before the command argument, e.g. `-l` for a login
    /// shell.
    pub fn with_shell_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.shell_arguments = Some(arguments.into());
        self
    }

    pub fn shell_program(&self) -> &str {
        &self.shell_program
    }

    pub fn shell_arguments(&self) -> Option<&str> {
        self.shell_arguments.as_deref()
    }

    pub fn dialect(&self) -> ShellDialect {
        self.dialect
    }

    fn command_argument(&self, command: &str, arguments: &str) -> String {
        let invocation = join_non_empty(command, arguments);
        match self.dialect {
            ShellDialect::Posix => format!("-c \"{}\"", escape_double_quotes(&invocation)),
            ShellDialect::Cmd => format!("/c {invocation}"),
            ShellDialect::Sudo => invocation,
        }
    }
}

impl CommandFactory for ShellCommandFactory {
    fn build(
        &self,
        command: &str,
        arguments: Option<&str>,
    ) -> Result<CommandLine, CliCommandError> {
        let command_argument = self.command_argument(command, arguments.unwrap_or_default());
        let full_arguments = match &self.shell_arguments {
            Some(shell_arguments) => format!("{shell_arguments} {command_argument}"),
            None => command_argument,
        };
        Ok(CommandLine::new(self.shell_program.clone(), full_arguments))
    }

    fn is_shell(&self) -> bool {
        true
    }
}

fn join_non_empty(command: &str, arguments: &str) -> String {
    if arguments.is_empty() {
        command.to_string()
    } else {
        format!("{command} {arguments}")
    }
}

fn escape_double_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

/// Operating system a factory can be registered for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OsPlatform {
    Windows,
    Linux,
    MacOs,
    FreeBsd,
    /// Any other value of [`std::env::consts::OS`].
    Other(String),
}

impl OsPlatform {
    pub fn current() -> Self {
        Self::from_os_name(std::env::consts::OS)
    }

    pub fn from_os_name(name: &str) -> Self {
        match name {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::MacOs,
            "freebsd" => Self::FreeBsd,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Windows => "windows",
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::FreeBsd => "freebsd",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for OsPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks a factory by matching the running OS against an ordered list of
/// registrations, then the "other OS" fallback. No match at all is an error.
#[derive(Debug, Clone)]
pub struct OsDependentCommandFactory {
    platforms: Vec<(OsPlatform, Arc<dyn CommandFactory>)>,
    other: Option<Arc<dyn CommandFactory>>,
    current: OsPlatform,
}

impl Default for OsDependentCommandFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl OsDependentCommandFactory {
    pub fn new() -> Self {
        Self::for_platform(OsPlatform::current())
    }

    /// Resolve against `platform` instead of the running OS.
    pub fn for_platform(platform: OsPlatform) -> Self {
        Self {
            platforms: Vec::new(),
            other: None,
            current: platform,
        }
    }

    pub fn use_cmd_for_windows() -> Self {
        Self::new().use_for_os(OsPlatform::Windows, ShellCommandFactory::cmd())
    }

    pub fn use_cmd_for_windows_and_sh_for_others() -> Self {
        Self::use_cmd_for_windows().use_for_other_os(ShellCommandFactory::sh())
    }

    pub fn use_cmd_for_windows_and_bash_for_others() -> Self {
        Self::use_cmd_for_windows().use_for_other_os(ShellCommandFactory::bash())
    }

    /// Register `factory` for `platform`, replacing an earlier registration
    /// for the same platform.
    pub fn use_for_os(
        mut self,
        platform: OsPlatform,
        factory: impl CommandFactory + 'static,
    ) -> Self {
        self.platforms.retain(|(registered, _)| *registered != platform);
        self.platforms.push((platform, Arc::new(factory)));
        self
    }

    pub fn use_for_other_os(mut self, factory: impl CommandFactory + 'static) -> Self {
        self.other = Some(Arc::new(factory));
        self
    }

    fn resolve(&self) -> Option<&Arc<dyn CommandFactory>> {
        self.platforms
            .iter()
            .find(|(platform, _)| *platform == self.current)
            .map(|(_, factory)| factory)
            .or(self.other.as_ref())
    }
}

impl CommandFactory for OsDependentCommandFactory {
    fn build(
        &self,
        command: &str,
        arguments: Option<&str>,
    ) -> Result<CommandLine, CliCommandError> {
        match self.resolve() {
            Some(factory) => factory.build(command, arguments),
            None => Err(CliCommandError::NoMatchingShell {
                context: CommandContext::new(
                    join_non_empty(command, arguments.unwrap_or_default()),
                    None,
                ),
                os: self.current.to_string(),
            }),
        }
    }

    fn is_shell(&self) -> bool {
        true
    }
}
