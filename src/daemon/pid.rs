//! PID and port files for daemon lifecycle management.
//!
//! Both live in `<data_dir>/daemon/`.

use std::fs;
use std::io;
use std::path::Path;

/// Write the current process PID to the PID file
pub fn write_pid(daemon_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(daemon_dir)?;
    let pid_path = daemon_dir.join("pid");
    let pid = std::process::id();
    crate::util::atomic_write(&pid_path, pid.to_string().as_bytes())?;
    tracing::info!(pid = pid, path = %pid_path.display(), "wrote PID file");
    Ok(())
}

pub fn read_pid(daemon_dir: &Path) -> Option<u32> {
    let content = fs::read_to_string(daemon_dir.join("pid")).ok()?;
    content.trim().parse().ok()
}

pub fn write_port(daemon_dir: &Path, port: u16) -> io::Result<()> {
    fs::create_dir_all(daemon_dir)?;
    crate::util::atomic_write(&daemon_dir.join("port"), port.to_string().as_bytes())
}

pub fn read_port(daemon_dir: &Path) -> Option<u16> {
    let content = fs::read_to_string(daemon_dir.join("port")).ok()?;
    content.trim().parse().ok()
}

/// Remove both files; missing ones are ignored.
pub fn remove_files(daemon_dir: &Path) {
    for name in ["pid", "port"] {
        let path = daemon_dir.join(name);
        match fs::remove_file(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "removed daemon file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove daemon file"),
        }
    }
}

/// Check if a process with the given PID is running
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // Signal 0 only checks that the process exists
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    false
}

/// Remove the PID and port files if the recorded process is gone.
pub fn cleanup_stale(daemon_dir: &Path) {
    if let Some(pid) = read_pid(daemon_dir) {
        if !is_process_running(pid) {
            remove_files(daemon_dir);
            tracing::info!(pid = pid, "cleaned up stale PID file");
        }
    }
}
