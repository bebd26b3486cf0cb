//! Process termination capability.
//!
//! Killing a single process is available everywhere; killing the whole
//! descendant tree is not. Instead of probing for the capability at runtime,
//! each platform gets its own [`ProcessTerminator`] chosen at build time by
//! [`platform_terminator`], and callers ask [`ProcessTerminator::supports_tree_kill`]
//! up front.

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::process_group;

/// Strategy used by [`CliCommand`](crate::CliCommand) to stop a running process.
pub trait ProcessTerminator: Send + Sync + fmt::Debug {
    /// Kill only the process with the given id.
    fn kill(&self, pid: u32) -> io::Result<()>;

    /// Kill the process and every descendant it spawned.
    ///
    /// Implementations without this capability return
    /// [`io::ErrorKind::Unsupported`] and report `false` from
    /// [`supports_tree_kill`](Self::supports_tree_kill).
    fn kill_tree(&self, pid: u32) -> io::Result<()>;

    fn supports_tree_kill(&self) -> bool;
}

/// Unix terminator. Commands are process group leaders, so the group id is
/// the pid.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessGroupTerminator;

#[cfg(unix)]
impl ProcessTerminator for ProcessGroupTerminator {
    fn kill(&self, pid: u32) -> io::Result<()> {
        process_group::kill_process(pid)
    }

    fn kill_tree(&self, pid: u32) -> io::Result<()> {
        process_group::kill_process_group(pid)
    }

    fn supports_tree_kill(&self) -> bool {
        true
    }
}

#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsTerminator;

#[cfg(windows)]
impl ProcessTerminator for WindowsTerminator {
    fn kill(&self, pid: u32) -> io::Result<()> {
        process_group::kill_process(pid)
    }

    fn kill_tree(&self, pid: u32) -> io::Result<()> {
        process_group::kill_process_tree(pid)
    }

    fn supports_tree_kill(&self) -> bool {
        true
    }
}

/// Terminator for platforms with neither process groups nor `taskkill`.
/// It cannot kill anything by pid; callers should keep the child handle
/// instead.
#[cfg(not(any(unix, windows)))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedTerminator;

#[cfg(not(any(unix, windows)))]
impl ProcessTerminator for UnsupportedTerminator {
    fn kill(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "killing a process by id is not supported on this platform",
        ))
    }

    fn kill_tree(&self, _pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "killing a process tree is not supported on this platform",
        ))
    }

    fn supports_tree_kill(&self) -> bool {
        false
    }
}

/// The terminator for the platform this crate was built for.
pub fn platform_terminator() -> Arc<dyn ProcessTerminator> {
    #[cfg(unix)]
    {
        Arc::new(ProcessGroupTerminator)
    }

    #[cfg(windows)]
    {
        Arc::new(WindowsTerminator)
    }

    #[cfg(not(any(unix, windows)))]
    {
        Arc::new(UnsupportedTerminator)
    }
}
