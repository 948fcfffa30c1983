use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::MAX_RECENT_REMOTE_PROJECTS;
use crate::location::{normalize_path, parse_remote};

/// A remote project the user connected to, most recent first in lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRemoteProject {
    pub host: String,
    pub remote_path: String,
    /// Milliseconds since the Unix epoch
    pub last_used_at: i64,
}

/// Clean up a stored list: accepts locator strings or objects, drops invalid
/// entries, keeps the newest of duplicates, sorts by recency and caps the list.
///
/// Entries without a usable timestamp count as used `now`.
pub fn normalize(value: &Value, now: i64) -> Vec<RecentRemoteProject> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };

    let mut deduped: HashMap<(String, String), RecentRemoteProject> = HashMap::new();
    for item in items {
        let Some(entry) = parse_entry(item, now) else {
            continue;
        };
        let key = (entry.host.clone(), entry.remote_path.clone());
        match deduped.get(&key) {
            Some(existing) if existing.last_used_at >= entry.last_used_at => {}
            _ => {
                deduped.insert(key, entry);
            }
        }
    }

    let mut recents: Vec<RecentRemoteProject> = deduped.into_values().collect();
    recents.sort_by(|a, b| {
        b.last_used_at
            .cmp(&a.last_used_at)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.remote_path.cmp(&b.remote_path))
    });
    recents.truncate(MAX_RECENT_REMOTE_PROJECTS);
    recents
}

fn parse_entry(item: &Value, now: i64) -> Option<RecentRemoteProject> {
    let (host, remote_path, last_used_at) = match item {
        Value::String(locator) => {
            let (host, remote_path) = parse_remote(locator)?;
            (host, remote_path, now)
        }
        Value::Object(fields) => {
            let host = fields.get("host")?.as_str()?.trim().to_string();
            let remote_path = normalize_path(fields.get("remotePath")?.as_str()?);
            let last_used_at = fields
                .get("lastUsedAt")
                .and_then(|v| v.as_i64().or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64)))
                .unwrap_or(now);
            (host, remote_path, last_used_at)
        }
        _ => return None,
    };

    if host.is_empty() || remote_path.is_empty() {
        return None;
    }
    Some(RecentRemoteProject {
        host,
        remote_path,
        last_used_at,
    })
}

/// Move (host, path) to the front with timestamp `now`. Invalid input leaves
/// the list unchanged.
pub fn upsert(
    recents: &[RecentRemoteProject],
    host: &str,
    remote_path: &str,
    now: i64,
) -> Vec<RecentRemoteProject> {
    let host = host.trim();
    let remote_path = normalize_path(remote_path);
    if host.is_empty() || remote_path.is_empty() {
        return recents.to_vec();
    }

    let mut updated = Vec::with_capacity(recents.len() + 1);
    updated.push(RecentRemoteProject {
        host: host.to_string(),
        remote_path: remote_path.clone(),
        last_used_at: now,
    });
    updated.extend(
        recents
            .iter()
            .filter(|r| !(r.host == host && r.remote_path == remote_path))
            .cloned(),
    );
    updated.truncate(MAX_RECENT_REMOTE_PROJECTS);
    updated
}
