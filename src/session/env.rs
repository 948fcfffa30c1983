use std::collections::{HashMap, HashSet};

use super::ShellConfig;

const ALLOWED_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "USER", "LOGNAME", "SHELL", "TERM", "TMPDIR", "LANG",
    "SSH_AUTH_SOCK", "SSH_AGENT_PID",
    "NVM_DIR", "NVM_BIN", "NVM_INC",
    "PYENV_ROOT", "PYENV_SHELL",
    "RBENV_ROOT", "RBENV_SHELL",
    "CARGO_HOME", "RUSTUP_HOME",
    "GOPATH", "GOROOT", "GOBIN",
    "BUN_INSTALL",
    "HTTP_PROXY", "HTTPS_PROXY", "NO_PROXY",
    "http_proxy", "https_proxy", "no_proxy",
    "ANTHROPIC_API_KEY", "OPENAI_API_KEY",
    "SYSTEMROOT", "USERPROFILE", "APPDATA", "LOCALAPPDATA", "COMSPEC",
];

const ALLOWED_PREFIXES: &[&str] = &["DUPLEX_", "LC_", "XDG_"];

/// Environment for a new session: an allow-listed subset of ours plus
/// terminal settings and the session id.
pub fn build_session_env(shell: &ShellConfig, session_id: &str) -> HashMap<String, String> {
    filter_env(std::env::vars(), shell, session_id)
}

fn filter_env(
    vars: impl Iterator<Item = (String, String)>,
    shell: &ShellConfig,
    session_id: &str,
) -> HashMap<String, String> {
    let allowed: HashSet<&str> = ALLOWED_ENV_VARS.iter().copied().collect();
    let mut env: HashMap<String, String> = vars
        .filter(|(key, _)| {
            allowed.contains(key.as_str()) || ALLOWED_PREFIXES.iter().any(|p| key.starts_with(p))
        })
        .collect();

    env.insert("TERM".into(), "xterm-256color".into());
    env.insert("COLORTERM".into(), "truecolor".into());
    env.insert("SHELL".into(), shell.path.to_string_lossy().to_string());
    env.insert("DUPLEX_SESSION_ID".into(), session_id.to_string());
    env
}
