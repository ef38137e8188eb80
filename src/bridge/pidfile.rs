//! Advisory pid file tracking for the bridge daemon.
//!
//! The pid file is diagnostic, not authoritative: liveness always comes from
//! the socket. Reads tolerate a missing or mangled file, and clearing a file
//! that is already gone is not an error.

use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::error::Result;

/// Record the daemon pid, creating the parent directory if needed.
pub fn record(config: &BridgeConfig, pid: u32) -> Result<()> {
    if let Some(parent) = config.pid_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&config.pid_path, pid.to_string())?;
    Ok(())
}

/// Read the recorded pid.
///
/// Returns `None` when the file is missing or its contents do not parse as
/// a pid. Whether the process is still running is a separate question; see
/// [`is_process_alive`].
pub fn read(config: &BridgeConfig) -> Option<u32> {
    let pid_str = std::fs::read_to_string(&config.pid_path).ok()?;
    pid_str.trim().parse().ok()
}

/// Remove the pid file. A file that is already gone is fine; any other
/// failure is logged and swallowed.
pub fn clear(config: &BridgeConfig) {
    match std::fs::remove_file(&config.pid_path) {
        Ok(()) => debug!(path = %config.pid_path.display(), "removed pid file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(
                path = %config.pid_path.display(),
                error = %e,
                "could not remove pid file"
            );
        }
    }
}

/// Check whether a process with the given pid exists.
///
/// Signal 0 delivers nothing but still runs the kernel's permission check,
/// so EPERM proves the process exists under another uid. Pid 0 (our own
/// process group) and pids that do not fit a signed pid_t report false.
pub fn is_process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }

    // SAFETY: kill with signal 0 performs error checking only; no signal
    // is delivered to the target process.
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    matches!(
        std::io::Error::last_os_error().raw_os_error(),
        Some(libc::EPERM)
    )
}
