//! Run an external program once and collect everything it printed.
//!
//! [`CliCommand`] owns the child process for a single run. Standard output
//! and standard error are drained on their own threads while the program
//! runs, and the [`CliCommandResult`] only exists once the process exited
//! *and* both pipes reached end-of-stream. Blocking
//! ([`CliCommand::wait_for_exit`]) and async
//! ([`CliCommand::wait_for_exit_async`]) waits share that same completion
//! point.
//!
//! [`CommandFactory`] implementations turn a logical command into the literal
//! program and argument string for a shell dialect (`sh -c`, `cmd /c`,
//! `sudo`), and [`OsDependentCommandFactory`] picks one per operating system.

mod capture;
mod command;
mod error;
pub mod process;
pub mod process_group;
mod result;
pub mod shell;
mod signal;
mod start_info;
mod stream;

pub use capture::LINE_SEPARATOR;
pub use command::CliCommand;
pub use error::{CliCommandError, CommandContext, failure_message};
pub use process::{ProcessTerminator, platform_terminator};
pub use result::CliCommandResult;
pub use shell::{
    CommandFactory, DirectCommandFactory, OsDependentCommandFactory, OsPlatform,
    ShellCommandFactory, ShellDialect,
};
pub use start_info::{CommandLine, KillOnDispose, StartInfo, join_arguments};
pub use stream::DEFAULT_MAX_LINE_BYTES;

/// Re-exported so callers can configure output decoding without a direct
/// dependency.
pub use encoding_rs::Encoding;
/// Re-exported for [`CliCommand::wait_for_exit_async`].
pub use tokio_util::sync::CancellationToken;
