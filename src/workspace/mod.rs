//! Branch workspaces: full sibling copies of a repository, one per branch.
//!
//! A workspace for branch `b` of `/parent/app` lives at `/parent/app-b`. It
//! exists iff its root carries a `.git` marker; nothing about it is cached.

mod copy;
mod enumerate;
mod materialize;

use std::path::{Component, Path};
use std::sync::Arc;

pub use copy::{should_copy, LocalTreeCopier, TreeCopier};
pub use enumerate::BranchEntry;

use crate::constants::REPO_MARKER;

const STAGING_MARKER: &str = ".staging-";
use crate::error::{Error, Result};
use crate::git::GitService;
use crate::location::ProjectLocation;
use crate::remote::RemoteExecutor;

pub struct WorkspaceManager {
    git: GitService,
    remote: Arc<dyn RemoteExecutor>,
    copier: Arc<dyn TreeCopier>,
}

impl WorkspaceManager {
    pub fn new(git: GitService, remote: Arc<dyn RemoteExecutor>, copier: Arc<dyn TreeCopier>) -> Self {
        Self { git, remote, copier }
    }
}

/// Reject names that would escape the source's parent directory.
pub fn validate_branch(branch: &str) -> Result<&str> {
    let branch = branch.trim();
    if branch.is_empty() {
        return Err(Error::InvalidRequest("branch name is required".into()));
    }
    if branch.starts_with('/') || branch.starts_with('-') || branch.contains('\\') {
        return Err(Error::InvalidRequest(format!("invalid branch name: {branch}")));
    }
    if branch.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(Error::InvalidRequest(format!("invalid branch name: {branch}")));
    }
    Ok(branch)
}

/// `<parent>/<base>-<branch>` for a source location.
pub fn workspace_location(source: &ProjectLocation, branch: &str) -> Result<ProjectLocation> {
    let branch = validate_branch(branch)?;
    let base = source.base_name();
    if base.is_empty() {
        return Err(Error::InvalidLocation(format!("{source} has no folder name")));
    }
    Ok(source.parent()?.join(&format!("{base}-{branch}")))
}

pub fn is_workspace(path: &Path) -> bool {
    path.join(REPO_MARKER).exists()
}

/// [`is_workspace`] without blocking the runtime.
pub async fn is_workspace_async(path: &Path) -> bool {
    tokio::fs::try_exists(path.join(REPO_MARKER))
        .await
        .unwrap_or(false)
}

// Sibling of the destination so the final rename stays on one filesystem
fn staging_name(destination: &str) -> String {
    let short = uuid::Uuid::new_v4().simple().to_string();
    format!(".{destination}{STAGING_MARKER}{}", &short[..8])
}

/// In-progress or abandoned copy left by [`staging_name`]; never a workspace.
fn is_staging_name(name: &str) -> bool {
    name.starts_with('.') && name.contains(STAGING_MARKER)
}

fn relative_branch(relative: &Path) -> Option<String> {
    let parts: Vec<String> = relative
        .components()
        .map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    (!parts.is_empty()).then(|| parts.join("/"))
}
