// Power state: system power-save mode and whether the display is
// interactive (on and accepting input) or asleep.

use std::fs;
use std::path::{Path, PathBuf};

/// Source of power-save / display state plus a subscription for
/// power-save change notifications.
pub trait PowerMonitor {
    fn is_power_save_mode(&self) -> bool;

    fn is_interactive(&self) -> bool;

    /// Start delivering power-save change notifications
    fn register_receiver(&mut self);

    fn unregister_receiver(&mut self);

    fn is_receiver_registered(&self) -> bool;

    /// Refresh platform state. Returns true when a power-save change
    /// happened while a receiver is registered.
    fn poll(&mut self) -> bool {
        false
    }
}

/// Registration flag plus last seen power-save value, shared by backends
#[derive(Debug, Default, Clone, Copy)]
pub struct PowerReceiver {
    registered: bool,
    last_power_save: bool,
}

impl PowerReceiver {
    pub fn new(power_save: bool) -> Self {
        Self {
            registered: false,
            last_power_save: power_save,
        }
    }

    pub fn set_registered(&mut self, registered: bool) {
        if self.registered != registered {
            tracing::debug!(registered, "Power-save receiver");
        }
        self.registered = registered;
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Record the current value; true if it changed and someone is listening
    pub fn observe(&mut self, power_save: bool) -> bool {
        let changed = power_save != self.last_power_save;
        self.last_power_save = power_save;
        changed && self.registered
    }
}

/// Power state set by hand. Used headless and in tests.
#[derive(Debug)]
pub struct SimulatedPower {
    power_save: bool,
    interactive: bool,
    receiver: PowerReceiver,
    pending: bool,
    registrations: u32,
}

impl Default for SimulatedPower {
    fn default() -> Self {
        Self {
            power_save: false,
            interactive: true,
            receiver: PowerReceiver::new(false),
            pending: false,
            registrations: 0,
        }
    }
}

impl SimulatedPower {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_power_save(&mut self, power_save: bool) {
        self.power_save = power_save;
        self.pending |= self.receiver.observe(power_save);
    }

    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// How many times a receiver was registered
    pub fn registrations(&self) -> u32 {
        self.registrations
    }
}

impl PowerMonitor for SimulatedPower {
    fn is_power_save_mode(&self) -> bool {
        self.power_save
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn register_receiver(&mut self) {
        if !self.receiver.is_registered() {
            self.registrations += 1;
        }
        self.receiver.set_registered(true);
    }

    fn unregister_receiver(&mut self) {
        self.receiver.set_registered(false);
    }

    fn is_receiver_registered(&self) -> bool {
        self.receiver.is_registered()
    }

    fn poll(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

const PLATFORM_PROFILE: &str = "/sys/firmware/acpi/platform_profile";
const DRM_CLASS: &str = "/sys/class/drm";

/// Linux power state from sysfs: the ACPI platform profile for power-save
/// and DRM connector DPMS state for interactivity.
pub struct SysfsPower {
    profile_path: PathBuf,
    drm_path: PathBuf,
    power_save: bool,
    interactive: bool,
    receiver: PowerReceiver,
}

impl SysfsPower {
    pub fn new() -> Self {
        Self::with_paths(PLATFORM_PROFILE, DRM_CLASS)
    }

    pub fn with_paths(profile: impl Into<PathBuf>, drm: impl Into<PathBuf>) -> Self {
        let profile_path = profile.into();
        let drm_path = drm.into();
        let power_save = read_power_save(&profile_path);
        let interactive = read_interactive(&drm_path);
        Self {
            profile_path,
            drm_path,
            power_save,
            interactive,
            receiver: PowerReceiver::new(power_save),
        }
    }
}

impl Default for SysfsPower {
    fn default() -> Self {
        Self::new()
    }
}

fn read_power_save(profile: &Path) -> bool {
    fs::read_to_string(profile)
        .map(|s| s.trim() == "low-power")
        .unwrap_or(false)
}

/// Interactive if any connector reports DPMS "On". With no connectors to
/// inspect the display is assumed to be on.
fn read_interactive(drm: &Path) -> bool {
    let Ok(entries) = fs::read_dir(drm) else {
        return true;
    };
    let mut seen = false;
    for entry in entries.flatten() {
        let Ok(state) = fs::read_to_string(entry.path().join("dpms")) else {
            continue;
        };
        seen = true;
        if state.trim() == "On" {
            return true;
        }
    }
    !seen
}

impl PowerMonitor for SysfsPower {
    fn is_power_save_mode(&self) -> bool {
        self.power_save
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn register_receiver(&mut self) {
        self.receiver.set_registered(true);
    }

    fn unregister_receiver(&mut self) {
        self.receiver.set_registered(false);
    }

    fn is_receiver_registered(&self) -> bool {
        self.receiver.is_registered()
    }

    fn poll(&mut self) -> bool {
        self.interactive = read_interactive(&self.drm_path);
        self.power_save = read_power_save(&self.profile_path);
        self.receiver.observe(self.power_save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_only_delivered_while_registered() {
        let mut power = SimulatedPower::new();
        power.set_power_save(true);
        assert!(!power.poll());

        power.register_receiver();
        power.set_power_save(false);
        assert!(power.poll());
        assert!(!power.poll());

        power.unregister_receiver();
        power.set_power_save(true);
        assert!(!power.poll());
    }

    #[test]
    fn test_registration_counted_once() {
        let mut power = SimulatedPower::new();
        power.register_receiver();
        power.register_receiver();
        assert_eq!(power.registrations(), 1);
    }

    #[test]
    fn test_sysfs_reads_profile_and_dpms() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let connector = root.join("drm").join("card0-eDP-1");
        fs::create_dir_all(&connector).unwrap();
        let profile = root.join("platform_profile");
        fs::write(&profile, "balanced\n").unwrap();
        fs::write(connector.join("dpms"), "On\n").unwrap();

        let mut power = SysfsPower::with_paths(&profile, root.join("drm"));
        assert!(!power.is_power_save_mode());
        assert!(power.is_interactive());

        power.register_receiver();
        fs::write(&profile, "low-power\n").unwrap();
        fs::write(connector.join("dpms"), "Off\n").unwrap();
        assert!(power.poll());
        assert!(power.is_power_save_mode());
        assert!(!power.is_interactive());
    }
}
