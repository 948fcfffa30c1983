//! Runtime configuration.
//!
//! Loaded from `<duplex_home>/config/runtime.json`; every field has a default
//! so a missing or partial file is fine. A few fields can be overridden from
//! the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_COLS, DEFAULT_ROWS, LAUNCH_SETTLE_MS, MAX_LOCAL_OUTPUT_BYTES, MAX_REMOTE_OUTPUT_BYTES,
    REMOTE_SETTLE_MS,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DuplexConfig {
    /// Interactive shell for new sessions; detected from the user when unset
    pub shell_override: Option<String>,
    /// Remote-shell client binary
    pub transport: String,
    /// Shell the transport runs remote commands under (`<shell> -lc <cmd>`)
    pub remote_shell: String,
    /// Version-control binary
    pub vcs_binary: String,
    pub max_remote_output_bytes: usize,
    pub max_local_output_bytes: usize,
    /// Settle delay before the remote bootstrap line is written
    pub remote_settle_ms: u64,
    /// Settle delay before a local auto-launch command is written
    pub launch_settle_ms: u64,
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for DuplexConfig {
    fn default() -> Self {
        Self {
            shell_override: None,
            transport: "ssh".into(),
            remote_shell: "sh".into(),
            vcs_binary: "git".into(),
            max_remote_output_bytes: MAX_REMOTE_OUTPUT_BYTES,
            max_local_output_bytes: MAX_LOCAL_OUTPUT_BYTES,
            remote_settle_ms: REMOTE_SETTLE_MS,
            launch_settle_ms: LAUNCH_SETTLE_MS,
            default_cols: DEFAULT_COLS,
            default_rows: DEFAULT_ROWS,
        }
    }
}

impl DuplexConfig {
    /// Load from disk, then apply `DUPLEX_SHELL` / `DUPLEX_TRANSPORT`.
    pub fn load(duplex_home: &Path) -> Self {
        let mut config = Self::load_file(&config_path(duplex_home));
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    fn load_file(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path) {
            match serde_json::from_str::<DuplexConfig>(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Corrupt runtime config {}: {}", path.display(), e);
                }
            }
        }
        Self::default()
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(shell) = lookup("DUPLEX_SHELL").filter(|s| !s.trim().is_empty()) {
            self.shell_override = Some(shell);
        }
        if let Some(transport) = lookup("DUPLEX_TRANSPORT").filter(|s| !s.trim().is_empty()) {
            self.transport = transport;
        }
    }

    pub fn save(&self, duplex_home: &Path) -> std::io::Result<()> {
        let path = config_path(duplex_home);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        crate::util::atomic_write(&path, json.as_bytes())?;
        Ok(())
    }

    pub fn remote_settle(&self) -> Duration {
        Duration::from_millis(self.remote_settle_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }
}

pub fn config_path(duplex_home: &Path) -> PathBuf {
    duplex_home.join("config/runtime.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, r#"{"transport":"autossh","remote_settle_ms":400}"#).unwrap();

        let config = DuplexConfig::load_file(&path);
        assert_eq!(config.transport, "autossh");
        assert_eq!(config.remote_settle(), Duration::from_millis(400));
        assert_eq!(config.vcs_binary, "git");
        assert_eq!(config.default_cols, DEFAULT_COLS);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = config_path(dir.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{not json").unwrap();
        assert_eq!(DuplexConfig::load_file(&path), DuplexConfig::default());
    }

    #[test]
    fn env_overrides_win() {
        let mut config = DuplexConfig::default();
        config.apply_env(|name| match name {
            "DUPLEX_SHELL" => Some("/bin/zsh".into()),
            "DUPLEX_TRANSPORT" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.shell_override.as_deref(), Some("/bin/zsh"));
        assert_eq!(config.transport, "ssh");
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = DuplexConfig {
            launch_settle_ms: 900,
            ..DuplexConfig::default()
        };
        config.save(dir.path()).unwrap();
        assert_eq!(DuplexConfig::load_file(&config_path(dir.path())), config);
    }
}
