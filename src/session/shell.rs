use std::path::PathBuf;
#[cfg(target_os = "macos")]
use std::process::Command;

/// The user's interactive shell and how to start it as a login shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    pub path: PathBuf,
    pub name: String,
    pub login_args: Vec<String>,
}

impl ShellConfig {
    /// Override, then `$SHELL`, then the account database, then a default.
    pub fn detect(shell_override: Option<String>) -> Self {
        let shell_path = shell_override
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("SHELL").filter(|s| !s.is_empty()).map(PathBuf::from))
            .or_else(Self::get_user_shell)
            .unwrap_or_else(Self::fallback);
        Self::from_path(shell_path)
    }

    pub fn from_path(path: PathBuf) -> Self {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("bash")
            .to_string();

        let login_args = match name.as_str() {
            "fish" => vec!["--login".to_string()],
            "powershell" | "pwsh" | "cmd" => Vec::new(),
            _ => vec!["-l".to_string()],
        };

        Self {
            path,
            name,
            login_args,
        }
    }

    #[cfg(windows)]
    fn fallback() -> PathBuf {
        PathBuf::from("powershell.exe")
    }

    #[cfg(not(windows))]
    fn fallback() -> PathBuf {
        PathBuf::from("/bin/bash")
    }

    #[cfg(target_os = "macos")]
    fn get_user_shell() -> Option<PathBuf> {
        let username = whoami::username();
        let output = Command::new("dscl")
            .args([".", "-read", &format!("/Users/{username}"), "UserShell"])
            .output()
            .ok()?;

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find(|line| line.starts_with("UserShell:"))
            .map(|line| PathBuf::from(line.trim_start_matches("UserShell:").trim()))
    }

    #[cfg(target_os = "linux")]
    fn get_user_shell() -> Option<PathBuf> {
        let username = whoami::username();
        std::fs::read_to_string("/etc/passwd")
            .ok()?
            .lines()
            .find(|line| line.starts_with(&format!("{username}:")))
            .and_then(|line| line.split(':').last())
            .filter(|shell| !shell.is_empty())
            .map(PathBuf::from)
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    fn get_user_shell() -> Option<PathBuf> {
        None
    }
}
