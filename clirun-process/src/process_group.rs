//! OS-specific pieces used to terminate a spawned command.
//!
//! - On Unix every command is spawned as the leader of its own process
//!   group (see `CliCommand::start`), so `kill_process_group` reaches the
//!   command and every descendant that stayed in the group.
//! - On Windows the single-process kill goes through `TerminateProcess`, and
//!   the tree kill delegates to `taskkill /T /F`.
//!
//! "No such process" is treated as success everywhere: the process already
//! exited, which is what the caller asked for.

use std::io;

/// Send `SIGKILL` to a single process.
#[cfg(unix)]
pub fn kill_process(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    let result = unsafe { libc::kill(pid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

/// Send `SIGKILL` to every member of a process group.
#[cfg(unix)]
pub fn kill_process_group(process_group_id: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(process_group_id)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pgid out of range"))?;
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

/// Block until the child `pid` exits, leaving it unreaped.
///
/// The zombie keeps the pid (and, for a group leader, the group id) reserved
/// until a later `wait`, so signals sent before that cannot reach a recycled
/// pid.
#[cfg(unix)]
pub fn wait_exited_without_reaping(pid: u32) -> io::Result<()> {
    let id = libc::id_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let result = unsafe {
            libc::waitid(libc::P_PID, id, &mut info, libc::WEXITED | libc::WNOWAIT)
        };
        if result == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Kill a process by PID on Windows.
#[cfg(windows)]
pub fn kill_process(pid: u32) -> io::Result<()> {
    unsafe {
        let handle = winapi::um::processthreadsapi::OpenProcess(
            winapi::um::winnt::PROCESS_TERMINATE,
            0,
            pid,
        );
        if handle.is_null() {
            // Already gone.
            return Ok(());
        }
        let success = winapi::um::processthreadsapi::TerminateProcess(handle, 1);
        let err = io::Error::last_os_error();
        winapi::um::handleapi::CloseHandle(handle);
        if success == 0 { Err(err) } else { Ok(()) }
    }
}

/// Kill a process and all of its descendants on Windows.
#[cfg(windows)]
pub fn kill_process_tree(pid: u32) -> io::Result<()> {
    let status = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()?;

    // 128: the process was not found, so there is nothing left to kill.
    match status.code() {
        Some(0) | Some(128) => Ok(()),
        code => Err(io::Error::other(format!(
            "taskkill failed for pid {pid} (exit code {code:?})"
        ))),
    }
}

/// Check if a process (by PID) is still running.
///
/// A process that exited but has not been reaped yet still counts as
/// running.
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // kill with signal 0 checks if process exists without sending a signal
    let result = unsafe { libc::kill(pid, 0) };
    if result == 0 {
        return true;
    }
    let err = io::Error::last_os_error();
    // ESRCH = no such process, EPERM = exists but no permission (still running)
    err.raw_os_error() == Some(libc::EPERM)
}

#[cfg(windows)]
pub fn is_process_running(pid: u32) -> bool {
    let handle = unsafe {
        winapi::um::processthreadsapi::OpenProcess(
            winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION,
            0,
            pid,
        )
    };
    if handle.is_null() {
        return false;
    }

    let mut exit_code: u32 = 0;
    let result =
        unsafe { winapi::um::processthreadsapi::GetExitCodeProcess(handle, &mut exit_code) };
    unsafe { winapi::um::handleapi::CloseHandle(handle) };

    result != 0 && exit_code == winapi::um::minwinbase::STILL_ACTIVE
}
