// Quick toggle (tray entry / hotkey): what it shows and what a click writes.

use crate::config::{Settings, SettingsStore, KEY_ENABLE, KEY_ENABLE_ON_POWER_SAVE};
use crate::error::ConfigError;

/// Toggle shows as on when the overlay is wanted through either path.
pub fn is_active(settings: &Settings, power_saving: bool) -> bool {
    (power_saving && settings.enabled_on_power_save) || settings.enabled
}

/// Apply one click to `store`. Returns whether anything was written.
///
/// Active because of power-save: both switches are cleared so the overlay
/// stays off for the rest of this power-save period. Otherwise `enable`
/// is flipped.
pub fn activate(store: &mut dyn SettingsStore, power_saving: bool) -> Result<bool, ConfigError> {
    let settings = Settings::read(store);
    let changed = if power_saving && settings.enabled_on_power_save {
        store.put_ints(&[(KEY_ENABLE_ON_POWER_SAVE, 0), (KEY_ENABLE, 0)])?
    } else {
        store.put_bool(KEY_ENABLE, !settings.enabled)?
    };
    tracing::debug!(power_saving, changed, "Toggle activated");
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;
    use crate::store::JsonStore;

    fn settings(enabled: bool, on_power_save: bool) -> Settings {
        Settings {
            enabled,
            enabled_on_power_save: on_power_save,
            ..Settings::default()
        }
    }

    #[test]
    fn test_is_active() {
        assert!(!is_active(&settings(false, false), true));
        assert!(!is_active(&settings(false, true), false));
        assert!(is_active(&settings(false, true), true));
        assert!(is_active(&settings(true, false), false));
    }

    #[test]
    fn test_click_toggles_enable() {
        let mut store = MemoryStore::new();
        assert!(activate(&mut store, false).unwrap());
        assert!(Settings::read(&store).enabled);
        assert!(activate(&mut store, false).unwrap());
        assert!(!Settings::read(&store).enabled);
    }

    #[test]
    fn test_click_during_power_save_clears_both() {
        let mut store = MemoryStore::with_settings(settings(true, true));
        activate(&mut store, true).unwrap();
        let after = Settings::read(&store);
        assert!(!after.enabled);
        assert!(!after.enabled_on_power_save);
        assert!(!is_active(&after, true));
    }

    #[test]
    fn test_power_save_preference_kept_outside_power_save() {
        let mut store = MemoryStore::with_settings(settings(false, true));
        activate(&mut store, false).unwrap();
        let after = Settings::read(&store);
        assert!(after.enabled);
        assert!(after.enabled_on_power_save);
    }

    #[test]
    fn test_failed_power_save_click_keeps_both_switches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = JsonStore::open(&path);
        settings(true, true).write(&mut store).unwrap();

        // Loaded with both switches on, then the file turns into a directory
        let mut store = JsonStore::open(&path);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        assert!(activate(&mut store, true).is_err());
        let after = Settings::read(&store);
        assert!(after.enabled);
        assert!(after.enabled_on_power_save);
    }
}
