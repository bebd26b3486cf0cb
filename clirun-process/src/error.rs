use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::capture::LINE_SEPARATOR;

/// The command a failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandContext {
    pub command_text: String,
    pub working_directory: Option<PathBuf>,
}

impl CommandContext {
    pub fn new(command_text: impl Into<String>, working_directory: Option<&Path>) -> Self {
        Self {
            command_text: command_text.into(),
            working_directory: working_directory.map(Path::to_path_buf),
        }
    }

    fn describe(&self, reason: &str) -> String {
        failure_message(
            reason,
            &self.command_text,
            self.working_directory.as_deref(),
            None,
            None,
        )
    }
}

/// Errors raised by [`CliCommand`](crate::CliCommand) and the command
/// factories.
///
/// Every message ends with the command text and, when known, the working
/// directory, so a failure can be diagnosed without re-running it.
///
/// OS errors are shared behind an [`Arc`] so the error can be cloned, for
/// example to hand a copy to an error reporter.
#[derive(Debug, Clone, Error)]
pub enum CliCommandError {
    #[error("{}", .context.describe("The command has already been started."))]
    AlreadyStarted { context: CommandContext },

    #[error("{}", .context.describe("The command was not started."))]
    NotStarted { context: CommandContext },

    #[error("{}", .context.describe(&source_reason(.source)))]
    LaunchFailed {
        context: CommandContext,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("{}", .context.describe("Timed out waiting for command to execute."))]
    Timeout { context: CommandContext },

    #[error("{}", .context.describe("Waiting for the command was cancelled."))]
    Cancelled { context: CommandContext },

    /// The completion barrier finished without producing a result.
    #[error("{}", .context.describe("Failed to resolve the command result."))]
    ResultUnavailable { context: CommandContext },

    #[error("{}", .context.describe("Cannot access a disposed command."))]
    Disposed { context: CommandContext },

    #[error(
        "{}",
        .context.describe("Killing the entire process tree is not supported on this platform.")
    )]
    TreeKillUnsupported { context: CommandContext },

    #[error("{}", .context.describe(&format!("Failed to kill the command: {}", source_reason(.source))))]
    KillFailed {
        context: CommandContext,
        #[source]
        source: Arc<io::Error>,
    },

    #[error(
        "{}",
        .context.describe(&format!("No command factory matches the current operating system `{}`.", .os))
    )]
    NoMatchingShell { context: CommandContext, os: String },
}

impl CliCommandError {
    pub fn context(&self) -> &CommandContext {
        match self {
            Self::AlreadyStarted { context }
            | Self::NotStarted { context }
            | Self::LaunchFailed { context, .. }
            | Self::Timeout { context }
            | Self::Cancelled { context }
            | Self::ResultUnavailable { context }
            | Self::Disposed { context }
            | Self::TreeKillUnsupported { context }
            | Self::KillFailed { context, .. }
            | Self::NoMatchingShell { context, .. } => context,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

fn source_reason(source: &io::Error) -> String {
    source.to_string()
}

/// Render a failure in the fixed layout shared by every command error:
///
/// ```text
/// <reason>.
///
/// CLI command: <command text>
/// Working directory: <dir>
/// Exit code: <n>
/// Output:
/// <output>
/// ```
///
/// The reason always ends with a period; the working directory, exit code and
/// output lines are only present when known and non-blank.
pub fn failure_message(
    reason: &str,
    command_text: &str,
    working_directory: Option<&Path>,
    exit_code: Option<i32>,
    output: Option<&str>,
) -> String {
    let mut message = String::from(reason);
    if !reason.ends_with('.') {
        message.push('.');
    }

    message.push_str(LINE_SEPARATOR);
    message.push_str(LINE_SEPARATOR);
    message.push_str("CLI command: ");
    message.push_str(command_text);

    if let Some(dir) = working_directory {
        let dir = dir.display().to_string();
        if !dir.trim().is_empty() {
            message.push_str(LINE_SEPARATOR);
            let _ = write!(message, "Working directory: {dir}");
        }
    }

    if let Some(code) = exit_code {
        message.push_str(LINE_SEPARATOR);
        let _ = write!(message, "Exit code: {code}");
    }

    if let Some(output) = output.filter(|output| !output.trim().is_empty()) {
        message.push_str(LINE_SEPARATOR);
        message.push_str("Output:");
        message.push_str(LINE_SEPARATOR);
        message.push_str(output);
    }

    message
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn lines(parts: &[&str]) -> String {
        parts.join(LINE_SEPARATOR)
    }

    #[test]
    fn message_contains_every_known_section() {
        let message = failure_message(
            "unknown flag",
            "dotnet --unknownflag",
            Some(Path::new("/work")),
            Some(1),
            Some("usage: dotnet"),
        );
        assert_eq!(
            message,
            lines(&[
                "unknown flag.",
                "",
                "CLI command: dotnet --unknownflag",
                "Working directory: /work",
                "Exit code: 1",
                "Output:",
                "usage: dotnet",
            ])
        );
    }

    #[test]
    fn blank_sections_are_omitted() {
        let message = failure_message("Timed out.", "sleep 5", None, None, Some("  "));
        assert_eq!(message, lines(&["Timed out.", "", "CLI command: sleep 5"]));
    }

    #[test]
    fn launch_failure_ends_with_command_and_directory() {
        let error = CliCommandError::LaunchFailed {
            context: CommandContext::new("somemissingprogram", Some(Path::new("/srv"))),
            source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
        };
        let message = error.to_string();
        assert!(message.ends_with(&lines(&[
            "",
            "CLI command: somemissingprogram",
            "Working directory: /srv",
        ])));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn not_started_message() {
        let error = CliCommandError::NotStarted {
            context: CommandContext::new("echo", None),
        };
        assert_eq!(
            error.to_string(),
            lines(&["The command was not started.", "", "CLI command: echo"])
        );
    }
}
