use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{is_staging_name, is_workspace, relative_branch, WorkspaceManager};
use crate::constants::REPO_MARKER;
use crate::error::{Error, Result};
use crate::location::{posix_basename, posix_parent, quote, ProjectLocation};

/// One branch as seen by the branch picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchEntry {
    pub branch: String,
    /// Materialized workspace for this branch, if any
    pub workspace: Option<ProjectLocation>,
    /// Whether the source repository knows the branch
    pub in_repository: bool,
}

impl WorkspaceManager {
    /// Branch names that have a workspace next to `source`, sorted.
    pub async fn workspace_branches(&self, source: &ProjectLocation) -> Result<Vec<String>> {
        let prefix = format!("{}-", source.base_name());
        match source {
            ProjectLocation::Local { path } => {
                let parent = path
                    .parent()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| Error::InvalidLocation(format!("{source} has no parent directory")))?;
                tokio::task::spawn_blocking(move || scan_local(&parent, &prefix))
                    .await
                    .map_err(|e| Error::Io(format!("workspace scan failed: {e}")))?
            }
            ProjectLocation::Remote { host, remote_path } => {
                let parent = posix_parent(remote_path);
                let script = remote_scan_script(&parent, &format!("{}-", posix_basename(remote_path)));
                let output = self.remote.run(host, &script).await?;
                Ok(output
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(String::from)
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect())
            }
        }
    }

    /// Union of materialized workspaces and the source's branch list.
    pub async fn list(&self, source: &ProjectLocation) -> Result<Vec<BranchEntry>> {
        let materialized = self.workspace_branches(source).await?;
        let known = self.git.list_branches(source).await?;

        let mut entries: BTreeMap<String, BranchEntry> = BTreeMap::new();
        for branch in known {
            entries.insert(
                branch.clone(),
                BranchEntry {
                    branch,
                    workspace: None,
                    in_repository: true,
                },
            );
        }
        for branch in materialized {
            let workspace = super::workspace_location(source, &branch).ok();
            entries
                .entry(branch.clone())
                .or_insert_with(|| BranchEntry {
                    branch,
                    workspace: None,
                    in_repository: false,
                })
                .workspace = workspace;
        }
        Ok(entries.into_values().collect())
    }
}

fn scan_local(parent: &Path, prefix: &str) -> Result<Vec<String>> {
    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut branches = BTreeSet::new();
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_dir || !name.starts_with(prefix) {
            continue;
        }

        let mut roots = Vec::new();
        find_repo_roots(&entry.path(), &mut roots);
        for root in roots {
            let Ok(relative) = root.strip_prefix(parent) else {
                continue;
            };
            if let Some(branch) = relative_branch(relative)
                .and_then(|rel| rel.strip_prefix(prefix).map(String::from))
                .filter(|b| !b.is_empty())
            {
                branches.insert(branch);
            }
        }
    }
    Ok(branches.into_iter().collect())
}

// Stops descending at a repository root; symlinked directories and staging
// copies are not followed
fn find_repo_roots(dir: &Path, roots: &mut Vec<PathBuf>) {
    if is_workspace(dir) {
        roots.push(dir.to_path_buf());
        return;
    }
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
            return;
        }
    };
    for entry in entries.flatten() {
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && !is_staging_name(&entry.file_name().to_string_lossy()) {
            find_repo_roots(&entry.path(), roots);
        }
    }
}

/// One pipeline run from inside the parent: find repository markers, keep
/// those under `<prefix>` that are not staging copies, print the branch part,
/// dedupe. Paths are relative (`./...`), so a parent of `/` needs no special
/// case.
pub fn remote_scan_script(parent: &str, prefix: &str) -> String {
    format!(
        r#"parent={parent}
prefix={prefix}
cd "$parent" 2>/dev/null || exit 0
{{ find . -name {marker} -prune 2>/dev/null || true; }} | while IFS= read -r marker; do
  repo="${{marker%/{marker}}}"
  case "$repo" in
    "./$prefix"*)
      rel="${{repo#"./$prefix"}}"
      case "/$rel" in */.*{staging}*) continue ;; esac
      [ -n "$rel" ] && printf '%s\n' "$rel"
      ;;
  esac
done | sort -u"#,
        parent = quote(parent),
        prefix = quote(prefix),
        marker = REPO_MARKER,
        staging = super::STAGING_MARKER,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::git::GitService;
    use crate::testing::{ScriptedRemote, ScriptedRunner};
    use crate::workspace::LocalTreeCopier;

    fn repo(path: &Path) {
        fs::create_dir_all(path.join(".git")).unwrap();
    }

    #[test]
    fn scans_nested_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        repo(&dir.path().join("app"));
        repo(&dir.path().join("app-main"));
        repo(&dir.path().join("app-feat/login"));
        repo(&dir.path().join("app-feat/signup"));
        fs::create_dir_all(dir.path().join("app-empty/src")).unwrap();
        repo(&dir.path().join("application"));
        repo(&dir.path().join("other-x"));

        let branches = scan_local(dir.path(), "app-").unwrap();
        assert_eq!(branches, vec!["feat/login", "feat/signup", "main"]);
    }

    #[test]
    fn staging_copies_are_not_branches() {
        let dir = tempfile::tempdir().unwrap();
        repo(&dir.path().join("app-feat/login"));
        repo(&dir.path().join("app-feat/.signup.staging-1a2b3c4d"));

        let branches = scan_local(dir.path(), "app-").unwrap();
        assert_eq!(branches, vec!["feat/login"]);
    }

    fn run_scan_script(parent: &str) -> Option<Vec<String>> {
        which::which("sh").ok()?;
        which::which("find").ok()?;
        let output = std::process::Command::new("sh")
            .arg("-c")
            .arg(remote_scan_script(parent, "app-"))
            .output()
            .unwrap();
        assert!(output.status.success());
        Some(
            String::from_utf8(output.stdout)
                .unwrap()
                .lines()
                .map(String::from)
                .collect(),
        )
    }

    #[test]
    fn scan_script_lists_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        repo(&dir.path().join("app"));
        repo(&dir.path().join("app-main"));
        repo(&dir.path().join("app-feat/login"));
        repo(&dir.path().join("app-feat/.signup.staging-1a2b3c4d"));
        repo(&dir.path().join("other-x"));

        let parent = dir.path().to_string_lossy().to_string();
        let Some(branches) = run_scan_script(&parent) else {
            return;
        };
        assert_eq!(branches, vec!["feat/login", "main"]);
    }

    #[test]
    fn scan_script_handles_a_trailing_slash_parent() {
        // A source directly under `/` has the parent `/`
        let dir = tempfile::tempdir().unwrap();
        repo(&dir.path().join("app-main"));

        let parent = format!("{}/", dir.path().to_string_lossy());
        let Some(branches) = run_scan_script(&parent) else {
            return;
        };
        assert_eq!(branches, vec!["main"]);
    }

    #[test]
    fn scan_script_at_filesystem_root_keeps_the_prefix_match() {
        let script = remote_scan_script("/", "app-");
        assert!(script.starts_with("parent='/'\nprefix='app-'\ncd \"$parent\""));
        assert!(script.contains(r#""./$prefix"*)"#));
        assert!(!script.contains("//"));
    }

    #[test]
    fn missing_parent_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_local(&dir.path().join("gone"), "app-").unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_unions_workspaces_and_branches() {
        let dir = tempfile::tempdir().unwrap();
        repo(&dir.path().join("app"));
        repo(&dir.path().join("app-feature"));
        repo(&dir.path().join("app-stale"));

        let runner = ScriptedRunner::new(|_, _| Ok("main\nfeature\n".into()));
        let remote = ScriptedRemote::new(|_, _| Ok(String::new()));
        let workspaces = WorkspaceManager::new(GitService::new(runner), remote, Arc::new(LocalTreeCopier));

        let entries = workspaces
            .list(&ProjectLocation::local(dir.path().join("app")))
            .await
            .unwrap();
        let summary: Vec<(&str, bool, bool)> = entries
            .iter()
            .map(|e| (e.branch.as_str(), e.workspace.is_some(), e.in_repository))
            .collect();
        assert_eq!(
            summary,
            vec![("feature", true, true), ("main", false, true), ("stale", true, false)]
        );
        assert_eq!(
            entries[0].workspace,
            Some(ProjectLocation::local(dir.path().join("app-feature")))
        );
    }

    #[tokio::test]
    async fn remote_scan_uses_one_command() {
        let remote = ScriptedRemote::new(|_, _| Ok("feat/b\nmain\nfeat/b\n".into()));
        let runner = ScriptedRunner::new(|_, _| Ok(String::new()));
        let workspaces = WorkspaceManager::new(GitService::new(runner), remote.clone(), Arc::new(LocalTreeCopier));

        let source = ProjectLocation::parse("ssh://box:/srv/app").unwrap();
        let branches = workspaces.workspace_branches(&source).await.unwrap();
        assert_eq!(branches, vec!["feat/b", "main"]);

        let commands = remote.commands();
        assert_eq!(commands.len(), 1);
        assert!(commands[0].1.starts_with("parent='/srv'\nprefix='app-'\n"));
        assert!(commands[0].1.ends_with("done | sort -u"));
    }
}
