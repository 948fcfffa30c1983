use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::constants::{COPY_EXCLUDED_EXTENSION, COPY_EXCLUDED_SEGMENTS};
use crate::error::{Error, Result};

/// Copies a source tree into a directory that does not exist yet.
#[async_trait]
pub trait TreeCopier: Send + Sync {
    async fn copy_tree(&self, source: &Path, destination: &Path) -> Result<()>;
}

/// True when a path relative to the copy root belongs in a workspace.
pub fn should_copy(relative: &Path) -> bool {
    let excluded_segment = relative.components().any(|c| match c {
        Component::Normal(segment) => segment
            .to_str()
            .is_some_and(|s| COPY_EXCLUDED_SEGMENTS.contains(&s)),
        _ => false,
    });
    if excluded_segment {
        return false;
    }
    !relative
        .to_string_lossy()
        .ends_with(COPY_EXCLUDED_EXTENSION)
}

/// Filesystem copy run on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalTreeCopier;

#[async_trait]
impl TreeCopier for LocalTreeCopier {
    async fn copy_tree(&self, source: &Path, destination: &Path) -> Result<()> {
        let source: PathBuf = source.to_path_buf();
        let destination: PathBuf = destination.to_path_buf();

        tokio::task::spawn_blocking(move || {
            copy_filtered(&source, &source, &destination).map_err(|e| {
                Error::Materialize(format!(
                    "failed to copy {} to {}: {}",
                    source.display(),
                    destination.display(),
                    e
                ))
            })
        })
        .await
        .map_err(|e| Error::Materialize(format!("copy task failed: {e}")))?
    }
}

fn copy_filtered(root: &Path, from: &Path, to: &Path) -> io::Result<()> {
    fs::create_dir(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let src = entry.path();
        let relative = src.strip_prefix(root).unwrap_or(&src);
        if !should_copy(relative) {
            continue;
        }

        let target = to.join(entry.file_name());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            copy_filtered(root, &src, &target)?;
        } else if file_type.is_symlink() {
            copy_symlink(&src, &target)?;
        } else {
            fs::copy(&src, &target)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(src)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, target: &Path) -> io::Result<()> {
    // Without POSIX symlinks, copy what the link points at
    if fs::metadata(src)?.is_dir() {
        return Ok(());
    }
    fs::copy(src, target).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_predicate() {
        assert!(should_copy(Path::new("src/main.rs")));
        assert!(should_copy(Path::new(".git/HEAD")));
        assert!(should_copy(Path::new("outbox/mail.txt")));
        assert!(!should_copy(Path::new("node_modules")));
        assert!(!should_copy(Path::new("packages/web/node_modules/react/index.js")));
        assert!(!should_copy(Path::new("dist")));
        assert!(!should_copy(Path::new("a/dist-electron/main.js")));
        assert!(!should_copy(Path::new("out/x")));
        assert!(!should_copy(Path::new("release/app.asar")));
    }

    #[tokio::test]
    async fn copies_tree_without_excluded_entries() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("app");
        fs::create_dir_all(src.join("src")).unwrap();
        fs::create_dir_all(src.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(src.join("web/dist")).unwrap();
        fs::write(src.join("src/lib.rs"), "pub fn a() {}").unwrap();
        fs::write(src.join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(src.join("web/dist/bundle.js"), "x").unwrap();
        fs::write(src.join("web/app.asar"), "x").unwrap();
        fs::write(src.join("web/index.html"), "<html>").unwrap();

        let dest = dir.path().join("copy");
        LocalTreeCopier.copy_tree(&src, &dest).await.unwrap();

        assert_eq!(fs::read_to_string(dest.join("src/lib.rs")).unwrap(), "pub fn a() {}");
        assert!(dest.join("web/index.html").exists());
        assert!(!dest.join("node_modules").exists());
        assert!(!dest.join("web/dist").exists());
        assert!(!dest.join("web/app.asar").exists());
    }

    #[tokio::test]
    async fn refuses_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("app");
        fs::create_dir_all(&src).unwrap();
        let dest = dir.path().join("taken");
        fs::create_dir_all(&dest).unwrap();

        let err = LocalTreeCopier.copy_tree(&src, &dest).await.unwrap_err();
        assert!(matches!(err, Error::Materialize(_)));
    }
}
