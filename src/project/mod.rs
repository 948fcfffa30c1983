//! Opening projects and removing branch workspaces.

mod types;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

pub use types::ProjectInfo;

use crate::error::{Error, Result};
use crate::git::{classify, EmptyState, GitService};
use crate::location::{quote, ProjectLocation};
use crate::remote::RemoteExecutor;

pub struct ProjectService {
    git: GitService,
    remote: Arc<dyn RemoteExecutor>,
    vcs_binary: String,
}

impl ProjectService {
    pub fn new(git: GitService, remote: Arc<dyn RemoteExecutor>, vcs_binary: impl Into<String>) -> Self {
        Self {
            git,
            remote,
            vcs_binary: vcs_binary.into(),
        }
    }

    /// Open a directory on this machine. Non-repositories open without a branch.
    pub async fn open_local_project(&self, path: &Path) -> Result<ProjectInfo> {
        let path = if path.is_relative() {
            std::env::current_dir()?.join(path)
        } else {
            path.to_path_buf()
        };
        let is_dir = tokio::fs::metadata(&path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(Error::InvalidRequest(format!(
                "Project folder does not exist: {}",
                path.display()
            )));
        }

        let location = ProjectLocation::local(&path);
        let (branch, remote_url) = if self.git.is_work_tree(&location).await? {
            (
                Some(self.git.current_branch(&location).await?),
                self.git.remote_url(&location).await?,
            )
        } else {
            (None, None)
        };

        info!(location = %location, branch = ?branch, "Opened local project");
        Ok(ProjectInfo {
            display_name: location.display_name(),
            location,
            branch,
            remote_url,
            opened_at: Utc::now(),
        })
    }

    /// Connect to a repository on a remote host; the path must be inside a work tree.
    pub async fn connect_remote_project(&self, host: &str, remote_path: &str) -> Result<ProjectInfo> {
        let location = ProjectLocation::remote(host, remote_path)?;
        let ProjectLocation::Remote { host, remote_path } = &location else {
            return Err(Error::InvalidLocation(format!("{location} is not remote")));
        };

        let check = format!(
            "cd {} && GIT_DISCOVERY_ACROSS_FILESYSTEM=1 {} rev-parse --is-inside-work-tree",
            quote(remote_path),
            self.vcs_binary
        );
        let inside = match self.remote.run(host, &check).await {
            Ok(output) => output == "true",
            Err(err) if classify(&err) == Some(EmptyState::NotARepository) => false,
            Err(err) => return Err(err),
        };
        if !inside {
            return Err(Error::InvalidRequest(format!(
                "Remote path is not a git repository: {location}"
            )));
        }

        let branch = self.git.current_branch(&location).await?;
        let remote_url = self.git.remote_url(&location).await?;

        info!(location = %location, branch = %branch, "Connected remote project");
        Ok(ProjectInfo {
            display_name: location.display_name(),
            location: location.clone(),
            branch: Some(branch),
            remote_url,
            opened_at: Utc::now(),
        })
    }

    /// Recursively delete a workspace directory. Missing is not an error.
    pub async fn delete_workspace(&self, location: &ProjectLocation) -> Result<()> {
        match location {
            ProjectLocation::Local { path } => {
                if path.parent().is_none() || path.as_os_str().is_empty() {
                    return Err(Error::InvalidRequest(format!(
                        "Refusing to delete {}",
                        path.display()
                    )));
                }
                match tokio::fs::remove_dir_all(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
            ProjectLocation::Remote { host, remote_path } => {
                if remote_path == "/" {
                    return Err(Error::InvalidRequest(format!("Refusing to delete {location}")));
                }
                self.remote
                    .run(host, &format!("rm -rf -- {}", quote(remote_path)))
                    .await?;
            }
        }
        info!(location = %location, "Deleted workspace");
        Ok(())
    }
}
