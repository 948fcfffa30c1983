use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry};

pub const DAEMON_LOG_FILE: &str = "duplex-daemon.log";

/// File logging for the daemon, rolled daily under `<home>/logs`.
///
/// The returned guard must live as long as the process; dropping it stops
/// the background writer.
pub fn init_daemon_logging(duplex_home: &Path) -> Option<WorkerGuard> {
    if env_flag("DUPLEX_LOG_DISABLE") {
        return None;
    }

    let log_dir = env::var_os("DUPLEX_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| duplex_home.join("logs"));

    if let Err(err) = fs::create_dir_all(&log_dir) {
        eprintln!(
            "Warning: failed to create daemon log directory {}: {}",
            log_dir.display(),
            err
        );
        return None;
    }

    let filter = level_filter("info");

    let file_appender = tracing_appender::rolling::daily(log_dir, DAEMON_LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    if env_flag("DUPLEX_LOG_STDERR") {
        let stderr_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true);
        let _ = Registry::default()
            .with(filter)
            .with(file_layer)
            .with(stderr_layer)
            .try_init();
    } else {
        let _ = Registry::default().with(filter).with(file_layer).try_init();
    }
    Some(guard)
}

/// Stderr logging for one-shot CLI commands; quiet unless asked.
pub fn init_cli_logging() {
    if env_flag("DUPLEX_LOG_DISABLE") {
        return;
    }
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let _ = Registry::default()
        .with(level_filter("warn"))
        .with(stderr_layer)
        .try_init();
}

fn level_filter(default: &str) -> EnvFilter {
    match env::var("DUPLEX_LOG_LEVEL") {
        Ok(level) if !level.trim().is_empty() => EnvFilter::new(level),
        _ => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
    }
}

pub fn env_flag(name: &str) -> bool {
    env::var(name).map(|value| is_truthy(&value)).unwrap_or(false)
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value,
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "YES", "on"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["", "0", "false", "nope"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}
