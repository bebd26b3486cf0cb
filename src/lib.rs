//! # clirun
//!
//! Run external command line programs and check what they did.
//!
//! - [`ProgramCli`] wraps one program with shared settings (shell, working
//!   directory, encoding, timeout, validation rules) and runs it
//!   synchronously or asynchronously.
//! - [`CliCommand`] is the underlying single-run engine. Its result is only
//!   produced after the process exited and both output pipes were fully
//!   drained.
//! - [`ResultValidationRules`] decide whether a finished run is a failure;
//!   violations surface as [`ProgramCliError::Validation`] with the full
//!   result attached.
//!
//! ```no_run
//! use clirun::ProgramCli;
//!
//! # async fn demo() -> Result<(), clirun::ProgramCliError> {
//! let result = ProgramCli::with_shell("echo").execute_async("hello").await?;
//! assert_eq!(result.output(), "hello");
//! # Ok(())
//! # }
//! ```
//!
//! No tracing subscriber is installed; events are emitted through `tracing`
//! for the embedding application to collect.

pub mod config;
pub mod error;
pub mod events;
pub mod program;
pub mod validation;

pub use config::{ProgramCliConfig, ShellSetting};
pub use error::{ConfigError, ProgramCliError};
pub use events::RunEvent;
pub use program::{ProgramCli, StartInfoConfiguration};
pub use validation::ResultValidationRules;

pub use clirun_commons::{
    ErrorReporter, MemoryErrorReporter, MemoryTelemetry, NoopErrorReporter, NoopTelemetry,
    TelemetrySink,
};
pub use clirun_process::{
    CancellationToken, CliCommand, CliCommandError, CliCommandResult, CommandContext,
    CommandFactory, CommandLine, DirectCommandFactory, Encoding, KillOnDispose, LINE_SEPARATOR,
    OsDependentCommandFactory, OsPlatform, ShellCommandFactory, ShellDialect, StartInfo,
    failure_message,
};
