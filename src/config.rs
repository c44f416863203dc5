// Persisted settings: keys, defaults and the per-user key/value store
// interface. Booleans are stored as 0/1 integers.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::patterns::{DEFAULT_PATTERN, DEFAULT_SHIFT_SPEED};

pub const KEY_ENABLE: &str = "enable";
pub const KEY_ENABLE_ON_POWER_SAVE: &str = "enableOnPowerSave";
pub const KEY_PATTERN: &str = "pattern";
pub const KEY_SHIFT_SPEED: &str = "shiftSpeedLevel";

/// Result of re-reading a store after an external change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    Unchanged,
    Changed,
    /// A different user became the foreground user
    UserSwitched,
}

/// Key/value store scoped to the current foreground user
pub trait SettingsStore {
    fn get_int(&self, key: &str) -> Option<i32>;

    /// Write a value for the current user. Returns whether it changed.
    fn put_int(&mut self, key: &str, value: i32) -> Result<bool, ConfigError>;

    /// Write several values as one change. Persistent stores override
    /// this so that either all values land or none do.
    fn put_ints(&mut self, values: &[(&str, i32)]) -> Result<bool, ConfigError> {
        let mut changed = false;
        for &(key, value) in values {
            changed |= self.put_int(key, value)?;
        }
        Ok(changed)
    }

    /// Pick up external modifications.
    fn reload(&mut self) -> Result<Reload, ConfigError> {
        Ok(Reload::Unchanged)
    }

    fn get_int_or(&self, key: &str, default: i32) -> i32 {
        self.get_int(key).unwrap_or(default)
    }

    fn get_bool(&self, key: &str) -> bool {
        self.get_int(key) == Some(1)
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<bool, ConfigError> {
        self.put_int(key, i32::from(value))
    }
}

/// Snapshot of the four settings, read in one go per notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub enabled: bool,
    pub enabled_on_power_save: bool,
    pub pattern_id: i32,
    pub shift_speed_level: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            enabled_on_power_save: false,
            pattern_id: DEFAULT_PATTERN,
            shift_speed_level: DEFAULT_SHIFT_SPEED,
        }
    }
}

impl Settings {
    pub fn read(store: &dyn SettingsStore) -> Self {
        Self {
            enabled: store.get_bool(KEY_ENABLE),
            enabled_on_power_save: store.get_bool(KEY_ENABLE_ON_POWER_SAVE),
            pattern_id: store.get_int_or(KEY_PATTERN, DEFAULT_PATTERN),
            shift_speed_level: store.get_int_or(KEY_SHIFT_SPEED, DEFAULT_SHIFT_SPEED),
        }
    }

    /// Whether power-save notifications are worth receiving at all
    pub fn should_listen_for_power_save(&self) -> bool {
        self.enabled || self.enabled_on_power_save
    }

    pub fn write(&self, store: &mut dyn SettingsStore) -> Result<bool, ConfigError> {
        store.put_ints(&[
            (KEY_ENABLE, i32::from(self.enabled)),
            (KEY_ENABLE_ON_POWER_SAVE, i32::from(self.enabled_on_power_save)),
            (KEY_PATTERN, self.pattern_id),
            (KEY_SHIFT_SPEED, self.shift_speed_level),
        ])
    }
}

/// In-memory store, used headless and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    current_user: u32,
    users: HashMap<u32, HashMap<String, i32>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        let mut store = Self::new();
        let _ = settings.write(&mut store);
        store
    }

    pub fn current_user(&self) -> u32 {
        self.current_user
    }

    pub fn set_current_user(&mut self, user: u32) {
        self.current_user = user;
    }
}

impl SettingsStore for MemoryStore {
    fn get_int(&self, key: &str) -> Option<i32> {
        self.users.get(&self.current_user)?.get(key).copied()
    }

    fn put_int(&mut self, key: &str, value: i32) -> Result<bool, ConfigError> {
        let previous = self
            .users
            .entry(self.current_user)
            .or_default()
            .insert(key.to_string(), value);
        Ok(previous != Some(value))
    }
}
