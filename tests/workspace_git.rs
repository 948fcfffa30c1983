//! End-to-end workspace and git flows against a real `git` binary.
//!
//! Skipped when `git` is not installed.

use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use duplex_lib::config::DuplexConfig;
use duplex_lib::git::{FileStatus, GitRunner, GitService};
use duplex_lib::location::ProjectLocation;
use duplex_lib::project::ProjectService;
use duplex_lib::remote::{RemoteExecutor, SshExecutor};
use duplex_lib::workspace::{LocalTreeCopier, WorkspaceManager};

fn git_available() -> bool {
    which::which("git").is_ok()
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// A repository with one commit plus build output that must not be copied.
fn seed_repo(root: &Path) -> std::path::PathBuf {
    let repo = root.join("repo");
    fs::create_dir_all(repo.join("src")).unwrap();
    git(&repo, &["-c", "init.defaultBranch=main", "init", "-q"]);
    git(&repo, &["config", "user.name", "Duplex Test"]);
    git(&repo, &["config", "user.email", "test@example.com"]);
    git(&repo, &["config", "commit.gpgsign", "false"]);

    fs::write(repo.join("src/main.rs"), "fn main() {}\n").unwrap();
    fs::write(repo.join(".gitignore"), "node_modules\ndist\n").unwrap();
    git(&repo, &["add", "."]);
    git(&repo, &["commit", "-q", "-m", "initial"]);

    fs::create_dir_all(repo.join("node_modules/left-pad")).unwrap();
    fs::write(repo.join("node_modules/left-pad/index.js"), "module.exports = 1").unwrap();
    fs::create_dir_all(repo.join("dist")).unwrap();
    fs::write(repo.join("dist/app.js"), "bundle").unwrap();
    repo
}

struct Services {
    git: GitService,
    workspaces: WorkspaceManager,
    projects: ProjectService,
}

fn services() -> Services {
    let config = DuplexConfig::default();
    let remote: Arc<dyn RemoteExecutor> = Arc::new(SshExecutor::from_config(&config));
    let git = GitService::new(Arc::new(GitRunner::from_config(&config, remote.clone())));
    Services {
        workspaces: WorkspaceManager::new(git.clone(), remote.clone(), Arc::new(LocalTreeCopier)),
        projects: ProjectService::new(git.clone(), remote, "git"),
        git,
    }
}

#[tokio::test]
async fn materialize_copies_once_and_checks_out_branch() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let repo = seed_repo(root.path());
    let svc = services();
    let source = ProjectLocation::local(&repo);

    let workspace = svc.workspaces.materialize(&source, "feature-x").await.unwrap();
    let ws_path = root.path().join("repo-feature-x");
    assert_eq!(workspace, ProjectLocation::local(&ws_path));
    assert!(ws_path.join(".git").is_dir());
    assert!(ws_path.join("src/main.rs").is_file());
    assert!(!ws_path.join("node_modules").exists());
    assert!(!ws_path.join("dist").exists());
    assert_eq!(svc.git.current_branch(&workspace).await.unwrap(), "feature-x");

    // A second open reuses the directory as-is
    fs::write(ws_path.join("scratch.txt"), "keep me").unwrap();
    let again = svc.workspaces.materialize(&source, "feature-x").await.unwrap();
    assert_eq!(again, workspace);
    assert_eq!(fs::read_to_string(ws_path.join("scratch.txt")).unwrap(), "keep me");

    // The source repository is untouched
    assert_eq!(svc.git.current_branch(&source).await.unwrap(), "main");

    let entries = svc.workspaces.list(&source).await.unwrap();
    let feature = entries.iter().find(|e| e.branch == "feature-x").unwrap();
    assert_eq!(feature.workspace.as_ref(), Some(&workspace));
    assert!(!feature.in_repository);
    let main = entries.iter().find(|e| e.branch == "main").unwrap();
    assert!(main.in_repository);
    assert_eq!(main.workspace, None);
}

#[tokio::test]
async fn status_stage_commit_cycle() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let repo = seed_repo(root.path());
    let svc = services();
    let location = ProjectLocation::local(&repo);

    fs::write(repo.join("src/main.rs"), "fn main() { println!(\"hi\"); }\n").unwrap();
    fs::write(repo.join("notes.txt"), "todo").unwrap();

    let status = svc.git.status(&location).await.unwrap();
    assert_eq!(status.branch, "main");
    assert_eq!((status.ahead, status.behind), (0, 0));
    assert!(status
        .changes
        .iter()
        .any(|c| c.file == "src/main.rs" && c.status == FileStatus::Modified && !c.staged));
    assert!(status
        .changes
        .iter()
        .any(|c| c.file == "notes.txt" && c.status == FileStatus::Untracked && !c.staged));

    svc.git.stage_file(&location, "src/main.rs").await.unwrap();
    let diff = svc.git.file_diff(&location, "src/main.rs", true).await.unwrap();
    assert!(diff.contains("println"));

    svc.git.unstage_file(&location, "src/main.rs").await.unwrap();
    assert!(svc
        .git
        .status(&location)
        .await
        .unwrap()
        .changes
        .iter()
        .all(|c| !c.staged));

    svc.git.stage_all(&location).await.unwrap();
    svc.git.commit(&location, "second").await.unwrap();
    assert!(svc.git.status(&location).await.unwrap().changes.is_empty());

    // No origin: push has nowhere to go and remote_url is absent
    assert_eq!(svc.git.remote_url(&location).await.unwrap(), None);
}

#[tokio::test]
async fn discard_restores_tracked_and_removes_untracked() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let repo = seed_repo(root.path());
    let svc = services();
    let location = ProjectLocation::local(&repo);

    fs::write(repo.join("src/main.rs"), "broken").unwrap();
    fs::write(repo.join("stray.txt"), "x").unwrap();
    svc.git.discard_all(&location).await.unwrap();

    assert_eq!(fs::read_to_string(repo.join("src/main.rs")).unwrap(), "fn main() {}\n");
    assert!(!repo.join("stray.txt").exists());
}

#[tokio::test]
async fn fresh_repository_reports_empty_states() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let root = tempfile::tempdir().unwrap();
    let repo = root.path().join("empty");
    fs::create_dir_all(&repo).unwrap();
    git(&repo, &["-c", "init.defaultBranch=trunk", "init", "-q"]);
    fs::write(repo.join("a.txt"), "a").unwrap();

    let svc = services();
    let location = ProjectLocation::local(&repo);
    let status = svc.git.status(&location).await.unwrap();
    assert_eq!(status.branch, "trunk");
    assert_eq!(status.changes.len(), 1);

    svc.git.stage_all(&location).await.unwrap();
    svc.git.unstage_all(&location).await.unwrap();
    assert!(svc
        .git
        .status(&location)
        .await
        .unwrap()
        .changes
        .iter()
        .all(|c| !c.staged));

    let project = svc.projects.open_local_project(&repo).await.unwrap();
    assert_eq!(project.display_name, "empty");
    assert_eq!(project.branch.as_deref(), Some("trunk"));

    let plain = root.path().join("plain");
    fs::create_dir_all(&plain).unwrap();
    let project = svc.projects.open_local_project(&plain).await.unwrap();
    assert_eq!(project.branch, None);
}
