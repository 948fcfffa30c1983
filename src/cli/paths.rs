//! Shared path utilities for the CLI and the daemon.
//!
//! Dev mode keeps its own data and home directories so a development daemon
//! never touches production state.

use std::path::PathBuf;

use crate::daemon::logging::DAEMON_LOG_FILE;

/// Get the data directory
///
/// - Dev: `~/.local/share/duplex-dev/` (Linux) or `~/Library/Application Support/duplex-dev/` (macOS)
/// - Prod: the same without `-dev`
pub fn data_dir(dev_mode: bool) -> Option<PathBuf> {
    let dir_name = if dev_mode { "duplex-dev" } else { "duplex" };
    dirs::data_dir().map(|d| d.join(dir_name))
}

/// Get the home directory holding config and logs (`~/.duplex[-dev]`)
pub fn home_dir(dev_mode: bool) -> Option<PathBuf> {
    let dir_name = if dev_mode { ".duplex-dev" } else { ".duplex" };
    dirs::home_dir().map(|d| d.join(dir_name))
}

/// Get the daemon directory (inside data_dir)
pub fn daemon_dir(dev_mode: bool) -> Option<PathBuf> {
    data_dir(dev_mode).map(|d| d.join("daemon"))
}

pub fn pid_path(dev_mode: bool) -> Option<PathBuf> {
    daemon_dir(dev_mode).map(|d| d.join("pid"))
}

pub fn port_path(dev_mode: bool) -> Option<PathBuf> {
    daemon_dir(dev_mode).map(|d| d.join("port"))
}

pub fn log_dir(dev_mode: bool) -> Option<PathBuf> {
    home_dir(dev_mode).map(|d| d.join("logs"))
}

pub fn daemon_log_path(dev_mode: bool) -> Option<PathBuf> {
    log_dir(dev_mode).map(|d| d.join(DAEMON_LOG_FILE))
}

/// Resolve the daemon binary path
///
/// Looks next to the current executable first, then on `PATH`.
pub fn daemon_binary_path() -> Option<PathBuf> {
    let exe_name = if cfg!(windows) {
        "duplex-daemon.exe"
    } else {
        "duplex-daemon"
    };

    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(parent) = current_exe.parent() {
            let candidate = parent.join(exe_name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    which::which(exe_name).ok()
}
