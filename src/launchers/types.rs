use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LauncherKind {
    Claude,
    Codex,
}

/// A command a new session can start automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Launcher {
    pub id: String,
    pub name: String,
    pub kind: LauncherKind,
    pub command: String,
    pub description: String,
    pub installed: bool,
}

impl Launcher {
    pub fn detect_installation(&mut self) {
        self.installed = which::which(&self.command).is_ok();
    }
}
