use std::path::Path;

use tracing::{debug, info, warn};

use super::{is_workspace_async, staging_name, validate_branch, workspace_location, WorkspaceManager};
use crate::constants::{COPY_EXCLUDED_EXTENSION, COPY_EXCLUDED_SEGMENTS, REPO_MARKER};
use crate::error::{Error, Result};
use crate::location::{posix_basename, posix_parent, quote, ProjectLocation};

impl WorkspaceManager {
    /// Return the workspace for `branch`, copying the source on first use,
    /// with `branch` checked out (created from the copied HEAD if missing).
    ///
    /// A failed copy leaves nothing at the destination. A failed checkout
    /// leaves the copied workspace in place.
    pub async fn materialize(&self, source: &ProjectLocation, branch: &str) -> Result<ProjectLocation> {
        let branch = validate_branch(branch)?;
        let destination = workspace_location(source, branch)?;

        let copied = match (source, &destination) {
            (ProjectLocation::Local { path: src }, ProjectLocation::Local { path: dest }) => {
                self.ensure_local_copy(src, dest).await?
            }
            (
                ProjectLocation::Remote { host, remote_path: src },
                ProjectLocation::Remote { remote_path: dest, .. },
            ) => self.ensure_remote_copy(host, src, dest).await?,
            _ => {
                return Err(Error::Materialize(format!(
                    "workspace {destination} does not match source {source}"
                )))
            }
        };

        self.switch_branch(&destination, branch).await?;
        info!(source = %source, branch = %branch, workspace = %destination, copied, "Workspace ready");
        Ok(destination)
    }

    async fn ensure_local_copy(&self, source: &Path, destination: &Path) -> Result<bool> {
        if is_workspace_async(destination).await {
            debug!(workspace = %destination.display(), "Reusing existing workspace");
            return Ok(false);
        }
        if tokio::fs::symlink_metadata(destination).await.is_ok() {
            return Err(Error::Materialize(format!(
                "{} exists but is not a repository",
                destination.display()
            )));
        }
        let source_is_dir = tokio::fs::metadata(source)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if !source_is_dir {
            return Err(Error::Materialize(format!(
                "source {} is not a directory",
                source.display()
            )));
        }

        let parent = destination
            .parent()
            .ok_or_else(|| Error::Materialize(format!("{} has no parent", destination.display())))?;
        tokio::fs::create_dir_all(parent).await?;

        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let staging = parent.join(staging_name(&file_name));

        let copied = match self.copier.copy_tree(source, &staging).await {
            Ok(()) => tokio::fs::rename(&staging, destination).await.map_err(Error::from),
            Err(err) => Err(err),
        };
        if let Err(err) = copied {
            if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(staging = %staging.display(), error = %cleanup, "Failed to remove staging copy");
                }
            }
            return Err(err);
        }
        Ok(true)
    }

    async fn ensure_remote_copy(&self, host: &str, source: &str, destination: &str) -> Result<bool> {
        let parent = posix_parent(destination);
        let staging = format!(
            "{}/{}",
            parent.trim_end_matches('/'),
            staging_name(posix_basename(destination))
        );
        let script = remote_copy_script(source, destination, &staging);
        let output = self.remote.run(host, &script).await?;
        Ok(output.lines().last() == Some("copied"))
    }

    async fn switch_branch(&self, workspace: &ProjectLocation, branch: &str) -> Result<()> {
        if let Err(err) = self.git.checkout_branch(workspace, branch).await {
            debug!(workspace = %workspace, branch = %branch, error = %err, "Checkout failed, creating branch");
            self.git.checkout_new_branch(workspace, branch).await?;
        }
        Ok(())
    }
}

/// Guarded remote copy: prints `exists` when the workspace is already there,
/// otherwise copies into a staging sibling, prunes excluded entries, renames
/// into place and prints `copied`. The staging copy never outlives the script.
pub fn remote_copy_script(source: &str, destination: &str, staging: &str) -> String {
    let names: Vec<String> = COPY_EXCLUDED_SEGMENTS
        .iter()
        .map(|segment| format!("-name {}", quote(segment)))
        .collect();
    let excluded = names.join(" -o ");
    let asar = quote(&format!("*{COPY_EXCLUDED_EXTENSION}"));

    format!(
        r#"dest={dest}
staging={staging}
if [ -e "$dest/{marker}" ]; then
  echo exists
  exit 0
fi
if [ -e "$dest" ]; then
  echo "$dest exists but is not a repository" >&2
  exit 1
fi
mkdir -p {parent} || exit 1
trap 'rm -rf "$staging"' EXIT
cp -R {source} "$staging" || exit 1
find "$staging" -type d \( {excluded} \) -prune -exec rm -rf {{}} + || exit 1
find "$staging" -name {asar} -exec rm -rf {{}} + || exit 1
mv "$staging" "$dest" || exit 1
echo copied"#,
        dest = quote(destination),
        staging = quote(staging),
        marker = REPO_MARKER,
        parent = quote(&posix_parent(destination)),
        source = quote(source),
    )
}
