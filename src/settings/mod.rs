//! Persistent key-value settings for the front end.
//!
//! Stored as one JSON object in `<data_dir>/settings.json`.

mod recent;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

pub use recent::{normalize as normalize_recent, upsert as upsert_recent, RecentRemoteProject};

use crate::error::Result;
use crate::util::atomic_write;

pub const RECENT_REMOTE_KEY: &str = "recentSshProjects";

fn defaults() -> Map<String, Value> {
    let defaults = json!({
        "lastProjectPath": null,
        "tabs": [],
        "activeTabId": null,
        "windowBounds": null,
        "appState": {
            "sidebarWidth": 240,
            "gitPanelWidth": 320,
            "gitPanelOpen": true,
            "bottomTerminalHeight": 208
        }
    });
    match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub struct SettingsStore {
    path: PathBuf,
    values: RwLock<Map<String, Value>>,
}

impl SettingsStore {
    /// Load the store, filling in defaults. An unreadable file is moved aside
    /// as `<name>.corrupt` and replaced by defaults.
    pub fn open(path: &Path) -> Result<Self> {
        let mut values = defaults();
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Value>(&content) {
                Ok(Value::Object(stored)) => values.extend(stored),
                Ok(_) | Err(_) => {
                    let backup = corrupt_path(path);
                    warn!(path = %path.display(), backup = %backup.display(), "Corrupt settings file, starting from defaults");
                    fs::rename(path, &backup)?;
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!(path = %path.display(), keys = values.len(), "Settings loaded");
        Ok(Self {
            path: path.to_path_buf(),
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    /// Set a key and persist. `null` is stored as-is and survives a reopen.
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value);
            Ok(())
        })
    }

    /// Apply `change` and write the whole file under one write lock.
    fn update<R>(&self, change: impl FnOnce(&mut Map<String, Value>) -> Result<R>) -> Result<R> {
        let mut values = self.values.write();
        let result = change(&mut values)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&*values)?;
        atomic_write(&self.path, content.as_bytes())?;
        Ok(result)
    }

    pub fn recent_remote(&self) -> Vec<RecentRemoteProject> {
        let stored = self.get(RECENT_REMOTE_KEY).unwrap_or(Value::Null);
        normalize_recent(&stored, now_millis())
    }

    /// Record a connection to (host, path) and return the updated list.
    pub fn touch_recent_remote(&self, host: &str, remote_path: &str) -> Result<Vec<RecentRemoteProject>> {
        self.update(|values| {
            let now = now_millis();
            let stored = values.get(RECENT_REMOTE_KEY).cloned().unwrap_or(Value::Null);
            let updated = upsert_recent(&normalize_recent(&stored, now), host, remote_path, now);
            values.insert(RECENT_REMOTE_KEY.to_string(), serde_json::to_value(&updated)?);
            Ok(updated)
        })
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".corrupt");
    path.with_file_name(name)
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::open(&dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get("tabs"), Some(json!([])));
        assert_eq!(store.get("appState").unwrap()["sidebarWidth"], json!(240));
        assert!(store.recent_remote().is_empty());
    }

    #[test]
    fn set_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();
        store.set("lastProjectPath", json!("/work/app")).unwrap();
        store.set("activeTabId", json!("t1")).unwrap();
        store.set("activeTabId", Value::Null).unwrap();

        assert_eq!(store.get("activeTabId"), Some(Value::Null));

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get("lastProjectPath"), Some(json!("/work/app")));
        assert_eq!(reopened.get("activeTabId"), Some(Value::Null));
    }

    #[test]
    fn cleared_key_does_not_revert_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();
        store.set("tabs", Value::Null).unwrap();

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.get("tabs"), store.get("tabs"));
        assert_eq!(reopened.get("tabs"), Some(Value::Null));
    }

    #[test]
    fn concurrent_writers_lose_no_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = std::sync::Arc::new(SettingsStore::open(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store.set(&format!("key{i}"), json!(i)).unwrap();
                    store.touch_recent_remote("box", &format!("/srv/p{i}")).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reopened = SettingsStore::open(&path).unwrap();
        for i in 0..8 {
            assert_eq!(reopened.get(&format!("key{i}")), Some(json!(i)));
        }
        assert_eq!(reopened.recent_remote().len(), 8);
    }

    #[test]
    fn corrupt_file_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ nope").unwrap();

        let store = SettingsStore::open(&path).unwrap();
        assert_eq!(store.get("tabs"), Some(json!([])));
        assert!(!path.exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("settings.json.corrupt")).unwrap(),
            "{ nope"
        );
    }

    #[test]
    fn touching_recents_persists_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::open(&path).unwrap();

        store.touch_recent_remote("box", "/srv/a").unwrap();
        let recents = store.touch_recent_remote("box", "/srv/b").unwrap();
        assert_eq!(recents[0].remote_path, "/srv/b");
        assert_eq!(recents[1].remote_path, "/srv/a");

        let reopened = SettingsStore::open(&path).unwrap();
        assert_eq!(reopened.recent_remote().len(), 2);
    }
}
