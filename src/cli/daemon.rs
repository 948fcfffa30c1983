//! Daemon lifecycle management commands
//!
//! Implements start, stop, status, restart, and logs for the CLI.

use std::fs;
use std::io::{self, BufRead, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::cli::paths;
use crate::daemon::client::{DaemonClient, DaemonStatusInfo};
use crate::daemon::logging::DAEMON_LOG_FILE;
use crate::daemon::pid;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const POLL_ATTEMPTS: usize = 20;

/// Daemon status as seen from the PID and port files
#[derive(Debug)]
pub struct DaemonStatus {
    pub running: bool,
    pub pid: Option<u32>,
    pub port: Option<u16>,
}

fn show(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".into())
}

fn daemon_dir(dev_mode: bool) -> Result<PathBuf, String> {
    paths::daemon_dir(dev_mode).ok_or_else(|| "Could not determine data directory".into())
}

/// Start the daemon
///
/// If `foreground` is true, runs in the current process with logs on stderr.
/// Otherwise spawns a detached daemon process.
pub fn start(dev_mode: bool, foreground: bool) -> Result<(), String> {
    let status = get_status(dev_mode);
    if status.running {
        return Err(format!(
            "Daemon already running (PID: {}, port: {})",
            show(status.pid),
            show(status.port)
        ));
    }

    pid::remove_files(&daemon_dir(dev_mode)?);

    if foreground {
        println!("Starting daemon in foreground (Ctrl+C to stop)...");
        std::env::set_var("DUPLEX_LOG_STDERR", "1");
        if dev_mode {
            std::env::set_var("DUPLEX_DEV_MODE", "1");
        }
        return crate::daemon::run_daemon().map_err(|e| e.to_string());
    }

    spawn_daemon_background(dev_mode)?;

    print!("Starting daemon");
    io::stdout().flush().ok();

    for _ in 0..POLL_ATTEMPTS {
        std::thread::sleep(POLL_INTERVAL);
        print!(".");
        io::stdout().flush().ok();

        let status = get_status(dev_mode);
        if status.running && status.port.is_some() {
            println!(" started!");
            println!(
                "Daemon running (PID: {}, port: {})",
                show(status.pid),
                show(status.port)
            );
            return Ok(());
        }
    }

    println!(" failed!");
    Err("Daemon did not start within 5 seconds".into())
}

/// Stop the daemon
pub fn stop(dev_mode: bool) -> Result<(), String> {
    let status = get_status(dev_mode);
    if !status.running {
        return Err("Daemon is not running".into());
    }
    let daemon_dir = daemon_dir(dev_mode)?;

    // Graceful shutdown over IPC first; the daemon kills its sessions
    if let Some(port) = status.port {
        if send_shutdown_request(port) {
            print!("Stopping daemon");
            io::stdout().flush().ok();

            for _ in 0..POLL_ATTEMPTS {
                std::thread::sleep(POLL_INTERVAL);
                print!(".");
                io::stdout().flush().ok();

                if !get_status(dev_mode).running {
                    println!(" stopped!");
                    pid::remove_files(&daemon_dir);
                    return Ok(());
                }
            }
            println!();
        }
    }

    #[cfg(unix)]
    if let Some(daemon_pid) = status.pid {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        println!("Sending SIGTERM to PID {}...", daemon_pid);
        if kill(Pid::from_raw(daemon_pid as i32), Signal::SIGTERM).is_ok() {
            for _ in 0..POLL_ATTEMPTS {
                std::thread::sleep(POLL_INTERVAL);
                if !pid::is_process_running(daemon_pid) {
                    println!("Daemon stopped");
                    pid::remove_files(&daemon_dir);
                    return Ok(());
                }
            }

            println!("Daemon not responding, sending SIGKILL...");
            let _ = kill(Pid::from_raw(daemon_pid as i32), Signal::SIGKILL);
            std::thread::sleep(Duration::from_millis(500));
        }

        pid::remove_files(&daemon_dir);
        return Ok(());
    }

    pid::remove_files(&daemon_dir);
    Err("Could not stop daemon".into())
}

/// Show daemon status
pub fn status(dev_mode: bool) -> Result<(), String> {
    let status = get_status(dev_mode);
    let mode = if dev_mode { "development" } else { "production" };

    if status.running {
        println!("Daemon status: running ({})", mode);
        if let Some(daemon_pid) = status.pid {
            println!("  PID:      {}", daemon_pid);
        }
        if let Some(port) = status.port {
            println!("  Port:     {}", port);
            match query_status(port) {
                Ok(info) => {
                    println!("  Version:  {}", info.version);
                    println!("  Uptime:   {}s", info.uptime_secs);
                    println!("  Sessions: {}", info.session_count);
                }
                Err(e) => println!("  (daemon did not answer: {})", e),
            }
        }
        if let Some(data_dir) = paths::data_dir(dev_mode) {
            println!("  Data:     {}", data_dir.display());
        }
        if let Some(log_path) = paths::daemon_log_path(dev_mode) {
            println!("  Logs:     {}", log_path.display());
        }
    } else {
        println!("Daemon status: not running ({})", mode);

        let stale = [paths::pid_path(dev_mode), paths::port_path(dev_mode)]
            .into_iter()
            .flatten()
            .any(|p| p.exists());
        if stale {
            println!("  (stale files detected - will be cleaned on next start)");
        }
    }

    Ok(())
}

/// Restart the daemon
pub fn restart(dev_mode: bool) -> Result<(), String> {
    if get_status(dev_mode).running {
        println!("Stopping daemon...");
        stop(dev_mode)?;
    }

    println!("Starting daemon...");
    start(dev_mode, false)
}

/// View daemon logs
pub fn logs(dev_mode: bool, follow: bool, lines: usize) -> Result<(), String> {
    let log_dir = paths::log_dir(dev_mode).ok_or("Could not determine log directory")?;

    // Rolling appender names files like duplex-daemon.log.2026-10-17
    let log_path = find_latest_log_file(&log_dir, DAEMON_LOG_FILE)
        .ok_or_else(|| format!("No log files found in: {}", log_dir.display()))?;

    if follow {
        tail_follow(&log_path, lines)
    } else {
        tail_file(&log_path, lines)
    }
}

/// Newest file in `log_dir` whose name starts with `prefix`
fn find_latest_log_file(log_dir: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(log_dir).ok()?;

    let mut log_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|name| name.starts_with(prefix))
                .unwrap_or(false)
        })
        .collect();

    log_files.sort_by(|a, b| {
        let a_time = a.metadata().and_then(|m| m.modified()).ok();
        let b_time = b.metadata().and_then(|m| m.modified()).ok();
        b_time.cmp(&a_time)
    });

    log_files.first().map(|e| e.path())
}

pub fn get_status(dev_mode: bool) -> DaemonStatus {
    let Some(dir) = paths::daemon_dir(dev_mode) else {
        return DaemonStatus {
            running: false,
            pid: None,
            port: None,
        };
    };
    let daemon_pid = pid::read_pid(&dir);
    let port = pid::read_port(&dir);

    let running = match (daemon_pid, port) {
        (Some(daemon_pid), _) => pid::is_process_running(daemon_pid),
        (None, Some(port)) => port_accepts_connections(port),
        (None, None) => false,
    };

    DaemonStatus {
        running,
        pid: daemon_pid,
        port,
    }
}

fn port_accepts_connections(port: u16) -> bool {
    std::net::TcpStream::connect(("127.0.0.1", port)).is_ok()
}

fn block_on_client<T>(
    port: u16,
    f: impl FnOnce(DaemonClient) -> std::pin::Pin<Box<dyn std::future::Future<Output = crate::Result<T>>>>,
) -> Result<T, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| e.to_string())?;
    runtime
        .block_on(async {
            let (client, _events) = tokio::time::timeout(Duration::from_secs(5), DaemonClient::connect(port))
                .await
                .map_err(|_| crate::Error::Daemon("connection timed out".into()))??;
            tokio::time::timeout(Duration::from_secs(5), f(client))
                .await
                .map_err(|_| crate::Error::Daemon("request timed out".into()))?
        })
        .map_err(|e| e.to_string())
}

fn query_status(port: u16) -> Result<DaemonStatusInfo, String> {
    block_on_client(port, |client| Box::pin(async move { client.status().await }))
}

fn send_shutdown_request(port: u16) -> bool {
    block_on_client(port, |client| Box::pin(async move { client.shutdown().await })).is_ok()
}

/// Spawn the daemon as a detached background process
fn spawn_daemon_background(dev_mode: bool) -> Result<(), String> {
    let daemon_path = paths::daemon_binary_path().ok_or("Could not find duplex-daemon binary")?;

    let mut cmd = Command::new(&daemon_path);
    if dev_mode {
        cmd.env("DUPLEX_DEV_MODE", "1");
    }

    for var in [
        "DUPLEX_LOG_LEVEL",
        "DUPLEX_LOG_STDERR",
        "DUPLEX_LOG_DIR",
        "DUPLEX_LOG_DISABLE",
        "DUPLEX_SHELL",
        "DUPLEX_TRANSPORT",
    ] {
        if let Ok(value) = std::env::var(var) {
            cmd.env(var, value);
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New session: the daemon outlives the terminal that started it
        unsafe {
            cmd.pre_exec(|| {
                let _ = nix::libc::setsid();
                Ok(())
            });
        }
    }

    cmd.spawn()
        .map_err(|e| format!("Failed to spawn daemon at {}: {}", daemon_path.display(), e))?;
    Ok(())
}

/// Show last N lines of a file
fn tail_file(path: &Path, lines: usize) -> Result<(), String> {
    let file = fs::File::open(path).map_err(|e| format!("Failed to open log file: {}", e))?;

    let reader = io::BufReader::new(file);
    let all_lines: Vec<String> = reader.lines().map_while(|l| l.ok()).collect();

    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }

    Ok(())
}

/// Follow a file (like tail -f)
fn tail_follow(path: &Path, initial_lines: usize) -> Result<(), String> {
    tail_file(path, initial_lines)?;

    println!("--- Following log (Ctrl+C to stop) ---");

    let mut file = fs::File::open(path).map_err(|e| format!("Failed to open log file: {}", e))?;
    file.seek(SeekFrom::End(0))
        .map_err(|e| format!("Failed to seek: {}", e))?;

    let mut reader = io::BufReader::new(file);

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => std::thread::sleep(Duration::from_millis(100)),
            Ok(_) => {
                print!("{}", line);
                io::stdout().flush().ok();
            }
            Err(e) => return Err(format!("Error reading log: {}", e)),
        }
    }
}
