// JSON-file settings store with per-user sections, plus a notify-based
// watcher that reports external edits of the file.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};

use crate::config::{Reload, SettingsStore};
use crate::error::ConfigError;

/// Environment variable overriding the settings file location
pub const SETTINGS_PATH_ENV: &str = "SMART_PIXELS_SETTINGS";

/// On-disk layout of the settings file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreFile {
    /// Foreground user whose section is read
    #[serde(default)]
    pub current_user: u32,
    #[serde(default)]
    pub debug_logging: bool,
    /// Integer settings keyed by user id
    #[serde(default)]
    pub users: HashMap<u32, HashMap<String, i32>>,
}

pub fn settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os(SETTINGS_PATH_ENV) {
        return PathBuf::from(path);
    }
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("SmartPixels").join("settings.json")
}

fn read_file(path: &Path) -> Result<StoreFile, ConfigError> {
    if !path.exists() {
        return Ok(StoreFile::default());
    }
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if data.trim().is_empty() {
        return Ok(StoreFile::default());
    }
    serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub struct JsonStore {
    path: PathBuf,
    data: StoreFile,
}

impl JsonStore {
    /// Open the store at `path`. A missing file reads as empty; a corrupt
    /// one is logged and also treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match read_file(&path) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(error = %e, "Settings file unreadable, using defaults");
                StoreFile::default()
            }
        };
        Self { path, data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn debug_logging(&self) -> bool {
        self.data.debug_logging
    }

    pub fn current_user(&self) -> u32 {
        self.data.current_user
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        write_file(&self.path, &self.data)
    }

    /// Persist `updated` and only then adopt it, so a failed write leaves
    /// memory matching the file.
    fn commit(&mut self, updated: StoreFile) -> Result<(), ConfigError> {
        write_file(&self.path, &updated)?;
        self.data = updated;
        Ok(())
    }
}

fn write_file(path: &Path, data: &StoreFile) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let json = serde_json::to_string_pretty(data).map_err(ConfigError::Serialize)?;
    fs::write(path, json).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

impl SettingsStore for JsonStore {
    fn get_int(&self, key: &str) -> Option<i32> {
        self.data
            .users
            .get(&self.data.current_user)?
            .get(key)
            .copied()
    }

    fn put_int(&mut self, key: &str, value: i32) -> Result<bool, ConfigError> {
        self.put_ints(&[(key, value)])
    }

    fn put_ints(&mut self, values: &[(&str, i32)]) -> Result<bool, ConfigError> {
        let user = self.data.current_user;
        let mut updated = self.data.clone();
        let section = updated.users.entry(user).or_default();
        let mut changed = false;
        for &(key, value) in values {
            changed |= section.insert(key.to_string(), value) != Some(value);
        }
        if !changed {
            return Ok(false);
        }
        self.commit(updated)?;
        Ok(true)
    }

    fn reload(&mut self) -> Result<Reload, ConfigError> {
        let fresh = read_file(&self.path)?;
        if fresh == self.data {
            return Ok(Reload::Unchanged);
        }
        let switched = fresh.current_user != self.data.current_user;
        self.data = fresh;
        Ok(if switched {
            Reload::UserSwitched
        } else {
            Reload::Changed
        })
    }
}

/// Watches the settings file's directory and calls back on edits of the file.
///
/// The directory is watched rather than the file so editors that replace
/// the file on save are still seen.
pub struct SettingsFileWatcher {
    _watcher: RecommendedWatcher,
}

impl SettingsFileWatcher {
    pub fn new<F>(path: &Path, on_change: F) -> Result<Self, ConfigError>
    where
        F: Fn() + Send + 'static,
    {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let file_name: Option<OsString> = path.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if ours {
                        on_change();
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Settings watch error"),
            },
            Config::default(),
        )
        .map_err(ConfigError::InitWatcher)?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| ConfigError::WatchPath {
                path: dir.clone(),
                source,
            })?;

        tracing::debug!(dir = %dir.display(), "Watching settings directory");
        Ok(Self { _watcher: watcher })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Settings, KEY_ENABLE, KEY_PATTERN};

    fn temp_path(dir: &tempfile::TempDir) -> PathBuf {
        dir.path().join("SmartPixels").join("settings.json")
    }

    #[test]
    fn test_missing_file_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(temp_path(&dir));
        assert_eq!(Settings::read(&store), Settings::default());
    }

    #[test]
    fn test_corrupt_file_reads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        let store = JsonStore::open(&path);
        assert_eq!(Settings::read(&store), Settings::default());
    }

    #[test]
    fn test_put_persists_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let mut store = JsonStore::open(&path);
        assert!(store.put_bool(KEY_ENABLE, true).unwrap());
        assert!(store.put_int(KEY_PATTERN, 5).unwrap());

        let reopened = JsonStore::open(&path);
        let settings = Settings::read(&reopened);
        assert!(settings.enabled);
        assert_eq!(settings.pattern_id, 5);
    }

    #[test]
    fn test_reload_detects_changes_and_user_switch() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let mut store = JsonStore::open(&path);
        store.put_bool(KEY_ENABLE, true).unwrap();
        assert_eq!(store.reload().unwrap(), Reload::Unchanged);

        fs::write(
            &path,
            r#"{ "current_user": 0, "users": { "0": { "enable": 0 } } }"#,
        )
        .unwrap();
        assert_eq!(store.reload().unwrap(), Reload::Changed);
        assert!(!store.get_bool(KEY_ENABLE));

        fs::write(
            &path,
            r#"{ "current_user": 10, "users": { "0": { "enable": 0 } } }"#,
        )
        .unwrap();
        assert_eq!(store.reload().unwrap(), Reload::UserSwitched);
        assert_eq!(store.current_user(), 10);
    }

    #[test]
    fn test_failed_write_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        // Parent of the settings file is a regular file, so nothing can be written
        let blocker = dir.path().join("SmartPixels");
        fs::write(&blocker, "not a directory").unwrap();
        let path = blocker.join("settings.json");
        let mut store = JsonStore::open(&path);

        assert!(store.put_bool(KEY_ENABLE, true).is_err());
        assert!(!store.get_bool(KEY_ENABLE));
        assert!(!path.exists());
    }

    #[test]
    fn test_put_ints_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let mut store = JsonStore::open(&path);
        assert!(store.put_ints(&[(KEY_ENABLE, 1), (KEY_PATTERN, 6)]).unwrap());
        assert!(!store.put_ints(&[(KEY_ENABLE, 1), (KEY_PATTERN, 6)]).unwrap());

        let settings = Settings::read(&JsonStore::open(&path));
        assert!(settings.enabled);
        assert_eq!(settings.pattern_id, 6);
    }

    #[test]
    fn test_reload_keeps_data_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_path(&dir);
        let mut store = JsonStore::open(&path);
        store.put_bool(KEY_ENABLE, true).unwrap();
        fs::write(&path, "][").unwrap();
        assert!(store.reload().is_err());
        assert!(store.get_bool(KEY_ENABLE));
    }
}
