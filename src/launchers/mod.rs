//! Known auto-launch commands for new sessions.

mod types;

pub use types::{Launcher, LauncherKind};

use crate::error::{Error, Result};

/// The built-in catalog, without installation detection.
pub fn catalog() -> Vec<Launcher> {
    vec![
        Launcher {
            id: "claude".into(),
            name: "Claude".into(),
            kind: LauncherKind::Claude,
            command: "claude".into(),
            description: "Anthropic's coding agent CLI".into(),
            installed: false,
        },
        Launcher {
            id: "codex".into(),
            name: "Codex".into(),
            kind: LauncherKind::Codex,
            command: "codex".into(),
            description: "OpenAI's coding agent CLI".into(),
            installed: false,
        },
    ]
}

/// Catalog with `installed` filled in from the local `PATH`.
///
/// Remote sessions resolve commands on the remote host, so this only
/// describes the local machine.
pub fn detect_installed() -> Vec<Launcher> {
    let mut launchers = catalog();
    for launcher in &mut launchers {
        launcher.detect_installation();
    }
    launchers
}

/// Turn a requested auto-launch into the command to type.
///
/// Accepts a catalog id or a bare command name; blank means none.
pub fn resolve(requested: Option<&str>) -> Result<Option<String>> {
    let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(None);
    };

    if let Some(launcher) = catalog().into_iter().find(|l| l.id == requested) {
        return Ok(Some(launcher.command));
    }

    let bare = requested
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if !bare {
        return Err(Error::InvalidRequest(format!(
            "auto-launch must be a launcher id or a bare command name: {requested}"
        )));
    }
    Ok(Some(requested.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_catalog_ids_and_bare_commands() {
        assert_eq!(resolve(Some("claude")).unwrap().as_deref(), Some("claude"));
        assert_eq!(resolve(Some(" codex ")).unwrap().as_deref(), Some("codex"));
        assert_eq!(resolve(Some("aider")).unwrap().as_deref(), Some("aider"));
        assert_eq!(resolve(Some("")).unwrap(), None);
        assert_eq!(resolve(None).unwrap(), None);
    }

    #[test]
    fn rejects_shell_syntax() {
        assert!(resolve(Some("rm -rf /")).is_err());
        assert!(resolve(Some("claude; reboot")).is_err());
        assert!(resolve(Some("$(whoami)")).is_err());
    }

    #[test]
    fn catalog_ids_are_unique() {
        let launchers = catalog();
        assert_eq!(launchers.len(), 2);
        assert_ne!(launchers[0].id, launchers[1].id);
        assert!(launchers.iter().all(|l| !l.installed));
    }
}
