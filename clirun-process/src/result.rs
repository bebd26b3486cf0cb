use std::path::{Path, PathBuf};

use crate::capture::CapturedText;

/// Outcome of one finished run.
///
/// Built exactly once, after the process exited and both output streams were
/// drained, and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CliCommandResult {
    command_text: String,
    working_directory: PathBuf,
    exit_code: i32,
    output: String,
    error: String,
    merged_output: String,
}

impl CliCommandResult {
    pub fn new(
        command_text: impl Into<String>,
        working_directory: impl Into<PathBuf>,
        exit_code: i32,
        output: impl Into<String>,
        error: impl Into<String>,
        merged_output: impl Into<String>,
    ) -> Self {
        Self {
            command_text: command_text.into(),
            working_directory: working_directory.into(),
            exit_code,
            output: output.into(),
            error: error.into(),
            merged_output: merged_output.into(),
        }
    }

    pub(crate) fn from_capture(
        command_text: String,
        working_directory: PathBuf,
        exit_code: i32,
        captured: CapturedText,
    ) -> Self {
        Self::new(
            command_text,
            working_directory,
            exit_code,
            captured.output,
            captured.error,
            captured.merged,
        )
    }

    /// The command that was executed: program plus argument string.
    pub fn command_text(&self) -> &str {
        &self.command_text
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Captured standard output.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Captured standard error.
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Standard output and standard error interleaved in the order the lines
    /// were received.
    pub fn merged_output(&self) -> &str {
        &self.merged_output
    }

    /// Whether anything was written to standard error.
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}
