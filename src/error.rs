use thiserror::Error;

use clirun_process::{CliCommandError, CliCommandResult, failure_message};

/// Failures of a [`ProgramCli`](crate::ProgramCli) run.
#[derive(Debug, Clone, Error)]
pub enum ProgramCliError {
    #[error(transparent)]
    Command(#[from] CliCommandError),

    /// The run completed but broke the configured validation rules.
    #[error("{}", validation_message(.reason, .result))]
    Validation {
        reason: String,
        result: Box<CliCommandResult>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ProgramCliError {
    /// The result of the run, when it got that far.
    pub fn result(&self) -> Option<&CliCommandResult> {
        match self {
            Self::Validation { result, .. } => Some(result),
            Self::Command(_) | Self::Config(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Command(err) if err.is_timeout())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Command(err) if err.is_cancelled())
    }
}

/// Rejected [`ProgramCliConfig`](crate::ProgramCliConfig) values.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("unknown output encoding `{label}`")]
    UnknownEncoding { label: String },

    #[error("invalid clirun configuration: {message}")]
    Invalid { message: String },
}

fn validation_message(reason: &str, result: &CliCommandResult) -> String {
    failure_message(
        reason,
        result.command_text(),
        Some(result.working_directory()),
        Some(result.exit_code()),
        Some(result.output()),
    )
}
