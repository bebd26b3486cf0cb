use std::path::PathBuf;

use serde::Serialize;

/// Lifecycle events recorded by [`ProgramCli`](crate::ProgramCli) through its
/// [`TelemetrySink`](clirun_commons::TelemetrySink).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        command_text: String,
        working_directory: PathBuf,
        pid: Option<u32>,
    },
    Completed {
        command_text: String,
        exit_code: i32,
        duration_ms: u64,
    },
    ValidationFailed {
        command_text: String,
        exit_code: i32,
        reason: String,
    },
}

impl RunEvent {
    pub fn command_text(&self) -> &str {
        match self {
            Self::Started { command_text, .. }
            | Self::Completed { command_text, .. }
            | Self::ValidationFailed { command_text, .. } => command_text,
        }
    }
}
