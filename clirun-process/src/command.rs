//! The execution engine: one [`CliCommand`] owns one child process for one
//! run.
//!
//! Three threads stand in for the OS notifications of a run: one reader per
//! output pipe and one exit watcher that owns the [`Child`]. The watcher reaps
//! the process, then blocks until both readers have seen end-of-stream before
//! it builds the [`CliCommandResult`] and sets the `completed` signal. Every
//! public wait observes `completed`, never the raw process exit, so a result
//! is never built from a partially drained pipe.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use encoding_rs::Encoding;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::capture::{CapturedText, StreamCapture, StreamKind};
use crate::error::{CliCommandError, CommandContext};
use crate::process::{ProcessTerminator, platform_terminator};
use crate::result::CliCommandResult;
use crate::signal::{CompletionSignal, SetOnDrop};
use crate::start_info::{CommandLine, KillOnDispose, StartInfo};
use crate::stream::read_lines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Started,
    Disposed,
}

/// State shared between the command and its helper threads.
#[derive(Debug)]
struct RunState {
    capture: StreamCapture,
    stdout_closed: CompletionSignal,
    stderr_closed: CompletionSignal,
    exited: CompletionSignal,
    completed: CompletionSignal,
    result: Mutex<Option<CliCommandResult>>,
    /// Held while the child is signalled by pid and while it is marked
    /// exited. The child is only reaped after that mark, so a pid signalled
    /// under this lock still belongs to it.
    signal_lock: Mutex<()>,
}

impl RunState {
    fn new() -> Self {
        Self {
            capture: StreamCapture::new(),
            stdout_closed: CompletionSignal::new(),
            stderr_closed: CompletionSignal::new(),
            exited: CompletionSignal::new(),
            completed: CompletionSignal::new(),
            result: Mutex::new(None),
            signal_lock: Mutex::new(()),
        }
    }

    fn mark_exited(&self) {
        let _guard = self.signal_lock.lock();
        self.exited.set();
    }

    /// Run `signal` unless the child already exited. Returns whether it ran.
    fn signal_unless_exited(
        &self,
        signal: impl FnOnce() -> io::Result<()>,
    ) -> io::Result<bool> {
        let _guard = self.signal_lock.lock();
        if self.exited.is_set() {
            return Ok(false);
        }
        signal().map(|()| true)
    }

    fn closed_signal(&self, stream: StreamKind) -> &CompletionSignal {
        match stream {
            StreamKind::Stdout => &self.stdout_closed,
            StreamKind::Stderr => &self.stderr_closed,
        }
    }

    /// Current captured text: the result's once completed, the live buffers
    /// before that.
    fn read_text(
        &self,
        finished: fn(&CliCommandResult) -> &str,
        live: fn(CapturedText) -> String,
    ) -> String {
        let result = self.result.lock();
        match result.as_ref() {
            Some(result) => finished(result).to_string(),
            None => live(self.capture.snapshot()),
        }
    }
}

/// A single run of an external program.
///
/// ```no_run
/// use clirun_process::CliCommand;
///
/// # fn main() -> Result<(), clirun_process::CliCommandError> {
/// let mut command = CliCommand::new("git", "--version");
/// command.start()?;
/// let result = command.wait_for_exit(None)?;
/// println!("{}", result.output());
/// # Ok(())
/// # }
/// ```
///
/// `start`, `kill` and `dispose` must not be called concurrently from
/// several threads. Dropping the command disposes it.
#[derive(Debug)]
pub struct CliCommand {
    start_info: StartInfo,
    kill_on_dispose: KillOnDispose,
    terminator: Arc<dyn ProcessTerminator>,
    lifecycle: Lifecycle,
    run: Option<Arc<RunState>>,
    pid: Option<u32>,
    stdin: Option<ChildStdin>,
}

impl CliCommand {
    pub fn new(program: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::from_command_line(CommandLine::new(program, arguments))
    }

    pub fn from_command_line(command_line: CommandLine) -> Self {
        Self::from_start_info(StartInfo::new(command_line))
    }

    pub fn from_start_info(start_info: StartInfo) -> Self {
        Self {
            start_info,
            kill_on_dispose: KillOnDispose::default(),
            terminator: platform_terminator(),
            lifecycle: Lifecycle::Created,
            run: None,
            pid: None,
            stdin: None,
        }
    }

    /// Replace the platform terminator used by `kill` and `dispose`.
    pub fn with_terminator(mut self, terminator: Arc<dyn ProcessTerminator>) -> Self {
        self.terminator = terminator;
        self
    }

    pub fn start_info(&self) -> &StartInfo {
        &self.start_info
    }

    /// Launch parameters, editable until the command starts.
    pub fn start_info_mut(&mut self) -> Result<&mut StartInfo, CliCommandError> {
        match self.lifecycle {
            Lifecycle::Created => Ok(&mut self.start_info),
            Lifecycle::Started => Err(CliCommandError::AlreadyStarted {
                context: self.context(),
            }),
            Lifecycle::Disposed => Err(CliCommandError::Disposed {
                context: self.context(),
            }),
        }
    }

    pub fn command_text(&self) -> String {
        self.start_info.command_text()
    }

    pub fn kill_on_dispose(&self) -> KillOnDispose {
        self.kill_on_dispose
    }

    /// Change what `dispose` kills. Asking for a tree kill from a terminator
    /// that cannot do one fails immediately.
    pub fn set_kill_on_dispose(
        &mut self,
        kill_on_dispose: KillOnDispose,
    ) -> Result<&mut Self, CliCommandError> {
        self.ensure_not_disposed()?;
        self.ensure_tree_kill_supported(kill_on_dispose)?;
        self.kill_on_dispose = kill_on_dispose;
        Ok(self)
    }

    /// OS process id, once started.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        self.run.as_ref().is_some_and(|run| run.exited.is_set())
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle == Lifecycle::Disposed
    }

    /// The writable end of the child's stdin pipe. Dropping it closes the
    /// pipe.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Standard output captured so far.
    pub fn output(&self) -> String {
        self.run.as_ref().map_or_else(String::new, |run| {
            run.read_text(CliCommandResult::output, |text| text.output)
        })
    }

    /// Standard error captured so far.
    pub fn error(&self) -> String {
        self.run.as_ref().map_or_else(String::new, |run| {
            run.read_text(CliCommandResult::error, |text| text.error)
        })
    }

    /// Both streams interleaved in arrival order, captured so far.
    pub fn merged_output(&self) -> String {
        self.run.as_ref().map_or_else(String::new, |run| {
            run.read_text(CliCommandResult::merged_output, |text| text.merged)
        })
    }

    /// The result, once the run completed.
    pub fn result(&self) -> Option<CliCommandResult> {
        self.run.as_ref().and_then(|run| run.result.lock().clone())
    }

    /// Launch the process and begin draining its output.
    ///
    /// A launch failure disposes the command before the error is returned.
    pub fn start(&mut self) -> Result<&mut Self, CliCommandError> {
        match self.lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Started => {
                return Err(CliCommandError::AlreadyStarted {
                    context: self.context(),
                });
            }
            Lifecycle::Disposed => {
                return Err(CliCommandError::Disposed {
                    context: self.context(),
                });
            }
        }
        self.ensure_tree_kill_supported(self.kill_on_dispose)?;

        let mut child = match self.build_command().and_then(|mut command| command.spawn()) {
            Ok(child) => child,
            Err(source) => return Err(self.fail_launch(source)),
        };
        let pid = child.id();
        self.pid = Some(pid);
        self.stdin = child.stdin.take();

        let run = Arc::new(RunState::new());
        if let Err(source) = self.spawn_helpers(&run, &mut child) {
            warn!(pid, error = %source, "failed to spawn command helper threads");
            let _ = child.kill();
            let _ = child.wait();
            return Err(self.fail_launch(source));
        }
        if let Err(source) = self.spawn_exit_watcher(&run, child) {
            warn!(pid, error = %source, "failed to spawn exit watcher");
            let _ = self.terminator.kill(pid);
            return Err(self.fail_launch(source));
        }

        self.run = Some(run);
        self.lifecycle = Lifecycle::Started;
        debug!(
            pid,
            command = %self.command_text(),
            working_directory = %self.start_info.working_directory.display(),
            "started command"
        );
        Ok(self)
    }

    /// Block until the run completed, or until `timeout` passes.
    ///
    /// A timeout leaves the process running.
    pub fn wait_for_exit(
        &self,
        timeout: Option<Duration>,
    ) -> Result<CliCommandResult, CliCommandError> {
        let run = self.started_run()?;
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));

        if !run.exited.wait_until(deadline) || !run.completed.wait_until(deadline) {
            debug!(pid = self.pid, ?timeout, "timed out waiting for command");
            return Err(CliCommandError::Timeout {
                context: self.context(),
            });
        }
        self.completed_result(run)
    }

    /// Await completion without blocking a thread. Cancelling `token` stops
    /// the wait, not the process.
    pub async fn wait_for_exit_async(
        &self,
        token: &CancellationToken,
    ) -> Result<CliCommandResult, CliCommandError> {
        let run = Arc::clone(self.started_run()?);
        tokio::select! {
            biased;
            () = token.cancelled() => {
                debug!(pid = self.pid, "wait for command cancelled");
                Err(CliCommandError::Cancelled { context: self.context() })
            }
            () = run.completed.wait_async() => self.completed_result(&run),
        }
    }

    /// Kill the process, or its whole process tree, unless it already
    /// exited. Then block until the run completed.
    pub fn kill(&self, entire_process_tree: bool) -> Result<CliCommandResult, CliCommandError> {
        let run = self.started_run()?;
        if !run.exited.is_set()
            && let Some(pid) = self.pid
        {
            if entire_process_tree {
                self.ensure_tree_kill_supported(KillOnDispose::EntireProcessTree)?;
            }
            let killed = run
                .signal_unless_exited(|| self.terminate(pid, entire_process_tree))
                .map_err(|source| CliCommandError::KillFailed {
                    context: self.context(),
                    source: Arc::new(source),
                })?;
            if killed {
                debug!(pid, entire_process_tree, "killed command");
            }
        }
        run.completed.wait();
        self.completed_result(run)
    }

    /// Release the command. Kills the process first when it is still running
    /// and the kill-on-dispose policy asks for it. Calling it again does
    /// nothing.
    pub fn dispose(&mut self) {
        if self.lifecycle == Lifecycle::Disposed {
            return;
        }

        if let (Some(run), Some(pid)) = (&self.run, self.pid)
            && self.kill_on_dispose != KillOnDispose::None
        {
            let entire_process_tree = self.kill_on_dispose == KillOnDispose::EntireProcessTree;
            match run.signal_unless_exited(|| self.terminate(pid, entire_process_tree)) {
                Ok(true) => debug!(pid, policy = ?self.kill_on_dispose, "disposed running command"),
                Ok(false) => {}
                Err(err) => warn!(pid, error = %err, "failed to kill command on dispose"),
            }
        }

        self.stdin = None;
        self.lifecycle = Lifecycle::Disposed;
    }

    fn terminate(&self, pid: u32, entire_process_tree: bool) -> io::Result<()> {
        if entire_process_tree {
            self.terminator.kill_tree(pid)
        } else {
            self.terminator.kill(pid)
        }
    }

    fn context(&self) -> CommandContext {
        CommandContext::new(
            self.command_text(),
            Some(self.start_info.working_directory()),
        )
    }

    fn ensure_not_disposed(&self) -> Result<(), CliCommandError> {
        if self.lifecycle == Lifecycle::Disposed {
            return Err(CliCommandError::Disposed {
                context: self.context(),
            });
        }
        Ok(())
    }

    fn ensure_tree_kill_supported(&self, policy: KillOnDispose) -> Result<(), CliCommandError> {
        if policy == KillOnDispose::EntireProcessTree && !self.terminator.supports_tree_kill() {
            return Err(CliCommandError::TreeKillUnsupported {
                context: self.context(),
            });
        }
        Ok(())
    }

    fn started_run(&self) -> Result<&Arc<RunState>, CliCommandError> {
        match (self.lifecycle, self.run.as_ref()) {
            (Lifecycle::Disposed, _) => Err(CliCommandError::Disposed {
                context: self.context(),
            }),
            (Lifecycle::Started, Some(run)) => Ok(run),
            _ => Err(CliCommandError::NotStarted {
                context: self.context(),
            }),
        }
    }

    fn completed_result(&self, run: &RunState) -> Result<CliCommandResult, CliCommandError> {
        run.result
            .lock()
            .clone()
            .ok_or_else(|| CliCommandError::ResultUnavailable {
                context: self.context(),
            })
    }

    fn fail_launch(&mut self, source: io::Error) -> CliCommandError {
        let error = CliCommandError::LaunchFailed {
            context: self.context(),
            source: Arc::new(source),
        };
        debug!(error = %error, "command failed to launch");
        self.pid = None;
        self.dispose();
        error
    }

    fn build_command(&self) -> io::Result<Command> {
        let info = &self.start_info;
        let mut command = Command::new(&info.program);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            if !info.arguments.is_empty() {
                command.raw_arg(&info.arguments);
            }
        }
        #[cfg(not(windows))]
        {
            let arguments = shell_words::split(&info.arguments)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?;
            command.args(arguments);
        }

        command
            .current_dir(&info.working_directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if info.env_clear {
            command.env_clear();
        }
        for key in &info.env_remove {
            command.env_remove(key);
        }
        command.envs(&info.env);

        // Leader of its own group, so the tree kill can signal the group.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        Ok(command)
    }

    fn spawn_helpers(&self, run: &Arc<RunState>, child: &mut Child) -> io::Result<()> {
        let encoding = self.start_info.encoding;
        let max_line_bytes = self.start_info.max_line_bytes;

        match child.stdout.take() {
            Some(pipe) => spawn_reader(run, StreamKind::Stdout, pipe, encoding, max_line_bytes)?,
            None => run.stdout_closed.set(),
        }
        match child.stderr.take() {
            Some(pipe) => spawn_reader(run, StreamKind::Stderr, pipe, encoding, max_line_bytes)?,
            None => run.stderr_closed.set(),
        }
        Ok(())
    }

    fn spawn_exit_watcher(&self, run: &Arc<RunState>, child: Child) -> io::Result<()> {
        let run = Arc::clone(run);
        let command_text = self.command_text();
        let working_directory = self.start_info.working_directory.clone();
        thread::Builder::new()
            .name(format!("clirun-exit-{}", child.id()))
            .spawn(move || watch_exit(&run, child, command_text, working_directory))?;
        Ok(())
    }
}

impl Drop for CliCommand {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn spawn_reader<R>(
    run: &Arc<RunState>,
    stream: StreamKind,
    pipe: R,
    encoding: Option<&'static Encoding>,
    max_line_bytes: usize,
) -> io::Result<()>
where
    R: Read + Send + 'static,
{
    let run = Arc::clone(run);
    thread::Builder::new()
        .name(format!("clirun-{}", stream.name()))
        .spawn(move || drain_stream(&run, stream, pipe, encoding, max_line_bytes))?;
    Ok(())
}

fn drain_stream<R: Read>(
    run: &RunState,
    stream: StreamKind,
    pipe: R,
    encoding: Option<&'static Encoding>,
    max_line_bytes: usize,
) {
    let _closed = SetOnDrop(run.closed_signal(stream));
    let outcome = read_lines(pipe, encoding, max_line_bytes, |line, truncated| {
        if truncated {
            trace!(stream = stream.name(), max_line_bytes, "truncated overlong line");
        }
        run.capture.append_line(stream, line);
    });
    if let Err(err) = outcome {
        warn!(stream = stream.name(), error = %err, "failed to read command output");
    }
    trace!(stream = stream.name(), "output stream closed");
}

fn watch_exit(
    run: &RunState,
    mut child: Child,
    command_text: String,
    working_directory: PathBuf,
) {
    // Declared first so it drops last: `completed` never precedes `exited`.
    let _completed = SetOnDrop(&run.completed);
    let _exited = SetOnDrop(&run.exited);

    let pid = child.id();
    // Marked exited before the reap, so no pid signal can follow the reap.
    #[cfg(unix)]
    let status = {
        if let Err(err) = crate::process_group::wait_exited_without_reaping(pid) {
            warn!(pid, error = %err, "failed to observe command exit");
        }
        run.mark_exited();
        child.wait()
    };
    // The open handle keeps the pid reserved until `child` drops.
    #[cfg(not(unix))]
    let status = {
        let status = child.wait();
        run.mark_exited();
        status
    };
    let exit_code = match status {
        Ok(status) => exit_code_of(status),
        Err(err) => {
            warn!(pid, error = %err, "failed to wait for command");
            -1
        }
    };
    trace!(pid, exit_code, "command exited, draining output");

    run.stdout_closed.wait();
    run.stderr_closed.wait();

    let mut slot = run.result.lock();
    let captured = run.capture.take();
    *slot = Some(CliCommandResult::from_capture(
        command_text,
        working_directory,
        exit_code,
        captured,
    ));
    drop(slot);
    debug!(pid, exit_code, "command completed");
}

fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
