use serde::{Deserialize, Serialize};

/// Per-file change kind as shown in the git panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    #[serde(rename = "M")]
    Modified,
    #[serde(rename = "A")]
    Added,
    #[serde(rename = "D")]
    Deleted,
    #[serde(rename = "?")]
    Untracked,
    #[serde(rename = "R")]
    Renamed,
    #[serde(rename = "C")]
    Copied,
    #[serde(rename = "U")]
    Unmerged,
}

impl FileStatus {
    /// Map a porcelain status column; `None` means "no change in this column".
    pub fn from_column(column: char) -> Option<Self> {
        match column {
            ' ' => None,
            'M' | 'T' => Some(FileStatus::Modified),
            'A' => Some(FileStatus::Added),
            'D' => Some(FileStatus::Deleted),
            '?' => Some(FileStatus::Untracked),
            'R' => Some(FileStatus::Renamed),
            'C' => Some(FileStatus::Copied),
            'U' => Some(FileStatus::Unmerged),
            _ => Some(FileStatus::Modified),
        }
    }

    /// One-letter code, identical to the serialized form.
    pub fn code(self) -> &'static str {
        match self {
            FileStatus::Modified => "M",
            FileStatus::Added => "A",
            FileStatus::Deleted => "D",
            FileStatus::Untracked => "?",
            FileStatus::Renamed => "R",
            FileStatus::Copied => "C",
            FileStatus::Unmerged => "U",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitFileChange {
    pub file: String,
    pub status: FileStatus,
    pub staged: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitStatus {
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub changes: Vec<GitFileChange>,
}

/// Parse `git status --porcelain=v1` output.
///
/// Column X is the index, column Y the worktree. Each line yields a staged
/// record when X carries a change and an unstaged record when Y does; an
/// untracked file (`??`) yields a single unstaged record.
pub fn parse_porcelain(output: &str) -> Vec<GitFileChange> {
    output.lines().flat_map(parse_porcelain_line).collect()
}

fn parse_porcelain_line(line: &str) -> Vec<GitFileChange> {
    let mut chars = line.chars();
    let (Some(index), Some(worktree)) = (chars.next(), chars.next()) else {
        return Vec::new();
    };
    let Some(raw_path) = line.get(3..).filter(|p| !p.is_empty()) else {
        return Vec::new();
    };
    let file = display_path(raw_path);

    let mut changes = Vec::with_capacity(2);
    if index != '?' {
        if let Some(status) = FileStatus::from_column(index) {
            changes.push(GitFileChange {
                file: file.clone(),
                status,
                staged: true,
            });
        }
    }
    if let Some(status) = FileStatus::from_column(worktree) {
        changes.push(GitFileChange {
            file,
            status,
            staged: false,
        });
    }
    changes
}

// Renames are reported as `old -> new`; the panel shows the new path
fn display_path(raw: &str) -> String {
    let path = raw.rsplit_once(" -> ").map(|(_, new)| new).unwrap_or(raw);
    unquote(path)
}

fn unquote(path: &str) -> String {
    match path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => path.to_string(),
    }
}

/// Parse `rev-list --left-right --count HEAD...@{upstream}` output.
pub fn parse_ahead_behind(output: &str) -> (u32, u32) {
    let mut parts = output.split_whitespace();
    let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (ahead, behind)
}
