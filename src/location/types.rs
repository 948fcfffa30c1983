use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{format, is_remote, normalize_path, parse_remote, posix_basename, posix_parent};
use crate::error::{Error, Result};

/// Where a project or workspace lives.
///
/// Values are compared and hashed by their normalized form; two spellings of
/// the same remote directory are the same location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProjectLocation {
    Local { path: PathBuf },
    Remote { host: String, remote_path: String },
}

impl ProjectLocation {
    pub fn local(path: impl AsRef<Path>) -> Self {
        // Rebuilding from components drops trailing and repeated separators
        let path: PathBuf = path.as_ref().components().collect();
        ProjectLocation::Local { path }
    }

    pub fn remote(host: &str, remote_path: &str) -> Result<Self> {
        let host = host.trim();
        let remote_path = normalize_path(remote_path);
        if host.is_empty() {
            return Err(Error::InvalidLocation("remote host is required".into()));
        }
        if remote_path.is_empty() {
            return Err(Error::InvalidLocation("remote path is required".into()));
        }
        Ok(ProjectLocation::Remote {
            host: host.to_string(),
            remote_path,
        })
    }

    pub fn parse(value: &str) -> Result<Self> {
        if is_remote(value) {
            let (host, remote_path) = parse_remote(value)
                .ok_or_else(|| Error::InvalidLocation(format!("invalid remote locator: {value}")))?;
            return Ok(ProjectLocation::Remote { host, remote_path });
        }

        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidLocation("empty project path".into()));
        }
        Ok(Self::local(trimmed))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ProjectLocation::Remote { .. })
    }

    /// Last path component of the project directory.
    pub fn base_name(&self) -> String {
        match self {
            ProjectLocation::Local { path } => path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            ProjectLocation::Remote { remote_path, .. } => posix_basename(remote_path).to_string(),
        }
    }

    /// Directory containing the project; sibling workspaces live here.
    pub fn parent(&self) -> Result<ProjectLocation> {
        match self {
            ProjectLocation::Local { path } => path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(ProjectLocation::local)
                .ok_or_else(|| {
                    Error::InvalidLocation(format!("{} has no parent directory", path.display()))
                }),
            ProjectLocation::Remote { host, remote_path } => {
                if remote_path == "/" {
                    return Err(Error::InvalidLocation(format!(
                        "{} has no parent directory",
                        self
                    )));
                }
                Ok(ProjectLocation::Remote {
                    host: host.clone(),
                    remote_path: posix_parent(remote_path),
                })
            }
        }
    }

    /// Same-kind location for a path relative to this one.
    pub fn join(&self, relative: &str) -> ProjectLocation {
        match self {
            ProjectLocation::Local { path } => ProjectLocation::local(path.join(relative)),
            ProjectLocation::Remote { host, remote_path } => ProjectLocation::Remote {
                host: host.clone(),
                remote_path: normalize_path(&format!("{remote_path}/{relative}")),
            },
        }
    }

    /// Name shown to the user: the folder name, suffixed with `@host` when remote.
    pub fn display_name(&self) -> String {
        match self {
            ProjectLocation::Local { .. } => self.base_name(),
            ProjectLocation::Remote { host, .. } => format!("{}@{}", self.base_name(), host),
        }
    }

    pub fn as_local(&self) -> Option<&Path> {
        match self {
            ProjectLocation::Local { path } => Some(path),
            ProjectLocation::Remote { .. } => None,
        }
    }
}

impl fmt::Display for ProjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectLocation::Local { path } => write!(f, "{}", path.display()),
            ProjectLocation::Remote { host, remote_path } => f.write_str(&format(host, remote_path)),
        }
    }
}

impl FromStr for ProjectLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ProjectLocation::parse(s)
    }
}

impl Serialize for ProjectLocation {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProjectLocation {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        ProjectLocation::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_spellings_compare_equal() {
        let a = ProjectLocation::parse("ssh://box:/srv//app/").unwrap();
        let b = ProjectLocation::parse("ssh://box/srv/app").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ssh://box:/srv/app");
    }

    #[test]
    fn invalid_remote_is_an_error() {
        assert!(matches!(
            ProjectLocation::parse("ssh://box"),
            Err(Error::InvalidLocation(_))
        ));
        assert!(ProjectLocation::parse("  ").is_err());
        assert!(ProjectLocation::remote(" ", "/srv").is_err());
        assert!(ProjectLocation::remote("box", "").is_err());
    }

    #[test]
    fn parent_and_join() {
        let remote = ProjectLocation::parse("ssh://box:/srv/app").unwrap();
        assert_eq!(remote.parent().unwrap().to_string(), "ssh://box:/srv");
        assert_eq!(remote.join("../app-x").to_string(), "ssh://box:/srv/app-x");
        assert!(ProjectLocation::parse("ssh://box:/").unwrap().parent().is_err());

        let local = ProjectLocation::local("/repo/");
        assert_eq!(local.parent().unwrap(), ProjectLocation::local("/"));
        assert_eq!(local.base_name(), "repo");
    }

    #[test]
    fn display_names() {
        let remote = ProjectLocation::parse("ssh://box:/srv/app").unwrap();
        assert_eq!(remote.display_name(), "app@box");
        assert_eq!(ProjectLocation::local("/home/me/site").display_name(), "site");
    }

    #[test]
    fn serde_uses_locator_string() {
        let remote = ProjectLocation::parse("ssh://box:/srv/app").unwrap();
        let json = serde_json::to_string(&remote).unwrap();
        assert_eq!(json, "\"ssh://box:/srv/app\"");
        let back: ProjectLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, remote);
        assert!(serde_json::from_str::<ProjectLocation>("\"ssh://\"").is_err());
    }
}
