use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use clirun_commons::{
    ErrorReporter, NoopErrorReporter, NoopTelemetry, TelemetrySink, base_directory,
    resolve_directory,
};
use clirun_process::{
    CliCommand, CliCommandError, CliCommandResult, CommandContext, CommandFactory,
    DEFAULT_MAX_LINE_BYTES, DirectCommandFactory, Encoding, KillOnDispose,
    OsDependentCommandFactory, StartInfo,
};

use crate::config::ProgramCliConfig;
use crate::error::{ConfigError, ProgramCliError};
use crate::events::RunEvent;
use crate::validation::ResultValidationRules;

/// Hook that edits a command's [`StartInfo`] right before it starts.
pub type StartInfoConfiguration = Arc<dyn Fn(&mut StartInfo) + Send + Sync>;

/// Runs one program over and over with shared settings: how to build the
/// command line, where to run it, how long to wait and which results count
/// as failures.
///
/// Every `execute*` call is an independent run with its own [`CliCommand`].
///
/// ```no_run
/// use clirun::{ProgramCli, ResultValidationRules};
///
/// # fn main() -> Result<(), clirun::ProgramCliError> {
/// let git = ProgramCli::new("git")
///     .in_directory("repo")
///     .with_result_validation_rules(ResultValidationRules::ZeroExitCodeAndNoError);
/// let status = git.execute("status --short")?;
/// println!("{}", status.output());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProgramCli {
    program: String,
    command_factory: Arc<dyn CommandFactory>,
    working_directory: PathBuf,
    encoding: Option<&'static Encoding>,
    max_line_bytes: usize,
    wait_for_exit_timeout: Option<Duration>,
    validation_rules: ResultValidationRules,
    kill_on_dispose: KillOnDispose,
    start_info_configurations: Vec<StartInfoConfiguration>,
    telemetry: Arc<dyn TelemetrySink<RunEvent>>,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl fmt::Debug for ProgramCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramCli")
            .field("program", &self.program)
            .field("command_factory", &self.command_factory)
            .field("working_directory", &self.working_directory)
            .field("encoding", &self.encoding.map(Encoding::name))
            .field("max_line_bytes", &self.max_line_bytes)
            .field("wait_for_exit_timeout", &self.wait_for_exit_timeout)
            .field("validation_rules", &self.validation_rules)
            .field("kill_on_dispose", &self.kill_on_dispose)
            .field(
                "start_info_configurations",
                &self.start_info_configurations.len(),
            )
            .finish_non_exhaustive()
    }
}

impl ProgramCli {
    /// Run `program` directly, in the base directory, requiring a zero exit
    /// code.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            command_factory: Arc::new(DirectCommandFactory),
            working_directory: base_directory(),
            encoding: None,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            wait_for_exit_timeout: None,
            validation_rules: ResultValidationRules::default(),
            kill_on_dispose: KillOnDispose::default(),
            start_info_configurations: Vec::new(),
            telemetry: Arc::new(NoopTelemetry),
            error_reporter: Arc::new(NoopErrorReporter),
        }
    }

    /// Run `program` through the operating system's shell: `cmd` on Windows,
    /// `sh` elsewhere.
    pub fn with_shell(program: impl Into<String>) -> Self {
        Self::new(program)
            .with_command_factory(OsDependentCommandFactory::use_cmd_for_windows_and_sh_for_others())
    }

    /// Build a wrapper from file-backed settings.
    pub fn from_config(
        program: impl Into<String>,
        config: &ProgramCliConfig,
    ) -> Result<Self, ProgramCliError> {
        let encoding = match &config.encoding {
            Some(label) => Some(Encoding::for_label(label.as_bytes()).ok_or_else(|| {
                ConfigError::UnknownEncoding {
                    label: label.clone(),
                }
            })?),
            None => None,
        };
        config.validate().map_err(|err| ConfigError::Invalid {
            message: format!("{err:#}"),
        })?;

        let mut cli = Self::new(program)
            .with_result_validation_rules(config.result_validation_rules)
            .with_kill_on_dispose(config.kill_on_dispose)
            .with_max_line_bytes(config.max_line_bytes);
        cli.command_factory = config.shell.command_factory();
        cli.encoding = encoding;
        cli.wait_for_exit_timeout = config.wait_for_exit_timeout();
        if let Some(directory) = &config.working_directory {
            cli = cli.in_directory(directory);
        }

        if config.env_clear || !config.env.is_empty() {
            let env = config.env.clone();
            let env_clear = config.env_clear;
            cli = cli.add_start_info_configuration(move |info| {
                info.env_clear = env_clear;
                for (key, value) in &env {
                    info.set_env(key.clone(), value.clone());
                }
            });
        }

        Ok(cli)
    }

    pub fn with_command_factory(mut self, factory: impl CommandFactory + 'static) -> Self {
        self.command_factory = Arc::new(factory);
        self
    }

    /// Run in `directory`, resolved against the base directory when
    /// relative.
    pub fn in_directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.working_directory = resolve_directory(&base_directory(), directory.as_ref());
        self
    }

    pub fn in_base_directory(mut self) -> Self {
        self.working_directory = base_directory();
        self
    }

    /// Run in `directory` exactly as given.
    pub fn with_working_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.working_directory = directory.into();
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn with_wait_for_exit_timeout(mut self, timeout: Duration) -> Self {
        self.wait_for_exit_timeout = Some(timeout);
        self
    }

    pub fn with_result_validation_rules(mut self, rules: ResultValidationRules) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn with_kill_on_dispose(mut self, kill_on_dispose: KillOnDispose) -> Self {
        self.kill_on_dispose = kill_on_dispose;
        self
    }

    /// Hooks run in registration order, after the wrapper applied its own
    /// settings.
    pub fn add_start_info_configuration(
        mut self,
        configure: impl Fn(&mut StartInfo) + Send + Sync + 'static,
    ) -> Self {
        self.start_info_configurations.push(Arc::new(configure));
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink<RunEvent>>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn with_error_reporter(mut self, error_reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = error_reporter;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn wait_for_exit_timeout(&self) -> Option<Duration> {
        self.wait_for_exit_timeout
    }

    pub fn result_validation_rules(&self) -> ResultValidationRules {
        self.validation_rules
    }

    /// Whether commands run through a command interpreter.
    pub fn use_command_shell(&self) -> bool {
        self.command_factory.is_shell()
    }

    /// A configured but not yet started command.
    pub fn create_command(&self, arguments: &str) -> Result<CliCommand, ProgramCliError> {
        let command_line = self
            .command_factory
            .build(&self.program, Some(arguments))?;
        let mut info = StartInfo::new(command_line);
        info.set_working_directory(self.working_directory.clone())
            .set_encoding(self.encoding);
        info.max_line_bytes = self.max_line_bytes;
        for configure in &self.start_info_configurations {
            configure(&mut info);
        }

        let mut command = CliCommand::from_start_info(info);
        command.set_kill_on_dispose(self.kill_on_dispose)?;
        Ok(command)
    }

    /// Start a run and hand the running command to the caller.
    pub fn start(&self, arguments: &str) -> Result<CliCommand, ProgramCliError> {
        self.reported(self.launch(arguments).map(|(command, _)| command))
    }

    /// Run to completion and validate the result.
    pub fn execute(&self, arguments: &str) -> Result<CliCommandResult, ProgramCliError> {
        self.reported(self.run_blocking(arguments, true))
    }

    /// Run to completion without validating the result.
    pub fn execute_raw(&self, arguments: &str) -> Result<CliCommandResult, ProgramCliError> {
        self.reported(self.run_blocking(arguments, false))
    }

    pub async fn execute_async(&self, arguments: &str) -> Result<CliCommandResult, ProgramCliError> {
        let token = CancellationToken::new();
        self.reported(self.run_async(arguments, &token, true).await)
    }

    pub async fn execute_raw_async(
        &self,
        arguments: &str,
    ) -> Result<CliCommandResult, ProgramCliError> {
        let token = CancellationToken::new();
        self.reported(self.run_async(arguments, &token, false).await)
    }

    /// Like [`execute_async`](Self::execute_async), but gives up waiting when
    /// `token` is cancelled. The abandoned command is then disposed according
    /// to the kill-on-dispose policy.
    pub async fn execute_async_with_cancellation(
        &self,
        arguments: &str,
        token: &CancellationToken,
    ) -> Result<CliCommandResult, ProgramCliError> {
        self.reported(self.run_async(arguments, token, true).await)
    }

    fn launch(&self, arguments: &str) -> Result<(CliCommand, Instant), ProgramCliError> {
        let mut command = self.create_command(arguments)?;
        command.start()?;
        let started = Instant::now();

        self.record(&RunEvent::Started {
            command_text: command.command_text(),
            working_directory: command.start_info().working_directory().to_path_buf(),
            pid: command.id(),
        });
        Ok((command, started))
    }

    fn run_blocking(
        &self,
        arguments: &str,
        validate: bool,
    ) -> Result<CliCommandResult, ProgramCliError> {
        let (command, started) = self.launch(arguments)?;
        let result = command.wait_for_exit(self.wait_for_exit_timeout)?;
        self.finish(result, started, validate)
    }

    async fn run_async(
        &self,
        arguments: &str,
        token: &CancellationToken,
        validate: bool,
    ) -> Result<CliCommandResult, ProgramCliError> {
        let (command, started) = self.launch(arguments)?;
        let wait = command.wait_for_exit_async(token);
        let result = match self.wait_for_exit_timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.map_err(|_| {
                CliCommandError::Timeout {
                    context: CommandContext::new(
                        command.command_text(),
                        Some(command.start_info().working_directory()),
                    ),
                }
            })??,
            None => wait.await?,
        };
        self.finish(result, started, validate)
    }

    fn finish(
        &self,
        result: CliCommandResult,
        started: Instant,
        validate: bool,
    ) -> Result<CliCommandResult, ProgramCliError> {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            command = result.command_text(),
            exit_code = result.exit_code(),
            duration_ms,
            "command finished"
        );
        self.record(&RunEvent::Completed {
            command_text: result.command_text().to_string(),
            exit_code: result.exit_code(),
            duration_ms,
        });

        if !validate {
            return Ok(result);
        }
        match self.validation_rules.violation(&result) {
            None => Ok(result),
            Some(reason) => {
                warn!(
                    command = result.command_text(),
                    exit_code = result.exit_code(),
                    rules = ?self.validation_rules,
                    "command result failed validation"
                );
                self.record(&RunEvent::ValidationFailed {
                    command_text: result.command_text().to_string(),
                    exit_code: result.exit_code(),
                    reason: reason.clone(),
                });
                Err(ProgramCliError::Validation {
                    reason,
                    result: Box::new(result),
                })
            }
        }
    }

    fn record(&self, event: &RunEvent) {
        if let Err(err) = self.telemetry.record(event) {
            warn!(error = %err, command = event.command_text(), "failed to record run event");
        }
    }

    fn reported<T>(&self, outcome: Result<T, ProgramCliError>) -> Result<T, ProgramCliError> {
        if let Err(error) = &outcome
            && let Err(report_error) = self
                .error_reporter
                .capture(&anyhow::Error::new(error.clone()))
        {
            warn!(error = %report_error, "failed to report command error");
        }
        outcome
    }
}
