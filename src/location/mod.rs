//! Location-transparent project paths.
//!
//! A project location is either a directory on this machine or a directory on
//! a host reachable through the remote-shell transport, encoded as
//! `ssh://host:/abs/path`.

mod types;

pub use types::ProjectLocation;

use crate::constants::REMOTE_PREFIX;

/// True iff the string uses the remote-locator prefix.
pub fn is_remote(location: &str) -> bool {
    location.starts_with(REMOTE_PREFIX)
}

/// Split a remote locator into `(host, remote_path)`.
///
/// Accepts both `ssh://host:/abs/path` and `ssh://host/abs/path`. Returns
/// `None` when the host or the normalized path end up empty.
pub fn parse_remote(location: &str) -> Option<(String, String)> {
    let raw = location.strip_prefix(REMOTE_PREFIX)?;
    if raw.is_empty() {
        return None;
    }

    let (host, path) = match raw.find(":/") {
        Some(marker) => (&raw[..marker], &raw[marker + 1..]),
        None => {
            let slash = raw.find('/')?;
            if slash == 0 {
                return None;
            }
            (&raw[..slash], &raw[slash..])
        }
    };

    let host = host.trim();
    let path = normalize_path(path);
    if host.is_empty() || path.is_empty() {
        return None;
    }
    Some((host.to_string(), path))
}

/// Normalize a remote path to absolute POSIX form.
///
/// Trims whitespace, turns `\` into `/`, forces a leading `/`, collapses
/// repeated separators, resolves `.` and `..`, and drops the trailing `/`
/// except for the root itself. Empty input stays empty.
pub fn normalize_path(input: &str) -> String {
    let trimmed = input.trim().replace('\\', "/");
    if trimmed.is_empty() {
        return String::new();
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }
    format!("/{}", segments.join("/"))
}

/// Canonical encoding of a remote location.
pub fn format(host: &str, remote_path: &str) -> String {
    format!("{REMOTE_PREFIX}{host}:{}", normalize_path(remote_path))
}

/// Quote a value as a single POSIX shell token.
///
/// Every remote command that embeds a path or branch name goes through here.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Final component of a POSIX path (`/srv/app` -> `app`).
pub fn posix_basename(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("")
}

/// Parent of a normalized POSIX path (`/srv/app` -> `/srv`, `/app` -> `/`).
pub fn posix_parent(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_remote_prefix() {
        assert!(is_remote("ssh://box:/srv/app"));
        assert!(!is_remote("/home/me/app"));
        assert!(!is_remote("sftp://box/srv"));
    }

    #[test]
    fn parses_colon_and_slash_forms() {
        assert_eq!(
            parse_remote("ssh://box:/srv/app"),
            Some(("box".into(), "/srv/app".into()))
        );
        assert_eq!(
            parse_remote("ssh://me@box/srv//app/"),
            Some(("me@box".into(), "/srv/app".into()))
        );
    }

    #[test]
    fn rejects_missing_host_or_path() {
        assert_eq!(parse_remote("ssh://"), None);
        assert_eq!(parse_remote("ssh:///srv/app"), None);
        assert_eq!(parse_remote("ssh://box"), None);
        assert_eq!(parse_remote("ssh:// :/srv"), None);
        assert_eq!(parse_remote("/srv/app"), None);
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(""), "");
        assert_eq!(normalize_path("   "), "");
        assert_eq!(normalize_path("/a//b/"), "/a/b");
        assert_eq!(normalize_path("a\\b\\c"), "/a/b/c");
        assert_eq!(normalize_path(" /srv/./app/../web "), "/srv/web");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("///"), "/");
        assert_eq!(normalize_path("/.."), "/");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in ["", "/a//b/", "x\\y/", "/srv/../../etc", "/", " rel/path "] {
            let once = normalize_path(input);
            assert_eq!(normalize_path(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn format_parse_is_stable() {
        for input in [
            "ssh://box:/srv/app/",
            "ssh://box/srv//app",
            "ssh://user@10.0.0.4:/home/user/code\\repo",
            "ssh://box:/",
        ] {
            let (host, path) = parse_remote(input).unwrap();
            let first = format(&host, &path);
            let (host2, path2) = parse_remote(&first).unwrap();
            assert_eq!(format(&host2, &path2), first, "input {input:?}");
        }
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(quote("plain"), "'plain'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote("$(rm -rf /)"), "'$(rm -rf /)'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn posix_helpers() {
        assert_eq!(posix_basename("/srv/app"), "app");
        assert_eq!(posix_basename("/"), "");
        assert_eq!(posix_parent("/srv/app"), "/srv");
        assert_eq!(posix_parent("/app"), "/");
        assert_eq!(posix_parent("/"), "/");
    }
}
