// Settings watcher: decides from the persisted settings and the live
// power-save flag whether the overlay service should run, and issues
// start/stop/restart commands.
//
// Every notification (settings edit, power-save change, user switch) is
// payload-free and triggers a full re-read.

use crate::config::{Settings, SettingsStore};
use crate::power::PowerMonitor;
use crate::service::ServiceHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    /// Stop then start, used to apply changed settings to a running overlay
    Restart,
    None,
}

/// Decision table for the service run-state. First matching row wins.
pub fn decide(enabled: bool, on_power_save: bool, power_saving: bool, running: bool) -> Action {
    if !enabled && on_power_save {
        match (power_saving, running) {
            (true, false) => Action::Start,
            (false, true) => Action::Stop,
            (true, true) => Action::Restart,
            (false, false) => Action::None,
        }
    } else if enabled {
        if running {
            Action::Restart
        } else {
            Action::Start
        }
    } else if running {
        Action::Stop
    } else {
        Action::None
    }
}

#[derive(Debug, Default)]
pub struct SettingsWatcher {
    service_running: bool,
}

impl SettingsWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last run-state this watcher successfully drove the service into
    pub fn service_running(&self) -> bool {
        self.service_running
    }

    /// Re-read everything and bring the service in line with it.
    pub fn update(
        &mut self,
        store: &dyn SettingsStore,
        power: &mut dyn PowerMonitor,
        host: &mut dyn ServiceHost,
    ) -> Action {
        let settings = Settings::read(store);
        let power_saving = power.is_power_save_mode();

        if settings.should_listen_for_power_save() {
            if !power.is_receiver_registered() {
                power.register_receiver();
            }
        } else if power.is_receiver_registered() {
            power.unregister_receiver();
        }

        let action = decide(
            settings.enabled,
            settings.enabled_on_power_save,
            power_saving,
            self.service_running,
        );
        let by_power_save = !settings.enabled && settings.enabled_on_power_save;
        tracing::debug!(
            enabled = settings.enabled,
            on_power_save = settings.enabled_on_power_save,
            power_saving,
            running = self.service_running,
            ?action,
            "Settings evaluated"
        );

        match action {
            Action::Start => match host.start_service(&settings) {
                Ok(()) => {
                    self.service_running = true;
                    tracing::info!(by_power_save, "Started overlay service");
                }
                Err(e) => tracing::error!(error = %e, "Failed to start overlay service"),
            },
            Action::Stop => match host.stop_service() {
                Ok(()) => {
                    self.service_running = false;
                    tracing::info!(by_power_save, "Stopped overlay service");
                }
                Err(e) => tracing::error!(error = %e, "Failed to stop overlay service"),
            },
            Action::Restart => self.restart(&settings, host, by_power_save),
            Action::None => {}
        }
        action
    }

    fn restart(&mut self, settings: &Settings, host: &mut dyn ServiceHost, by_power_save: bool) {
        if let Err(e) = host.stop_service() {
            tracing::error!(error = %e, "Failed to stop overlay service for restart");
            return;
        }
        self.service_running = false;
        match host.start_service(settings) {
            Ok(()) => {
                self.service_running = true;
                tracing::info!(by_power_save, "Restarted overlay service");
            }
            Err(e) => tracing::error!(error = %e, "Failed to restart overlay service"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemoryStore, KEY_ENABLE};
    use crate::error::HostError;
    use crate::power::SimulatedPower;

    #[derive(Default)]
    struct RecordingHost {
        calls: Vec<&'static str>,
        fail_start: bool,
    }

    impl ServiceHost for RecordingHost {
        fn start_service(&mut self, _settings: &Settings) -> Result<(), HostError> {
            self.calls.push("start");
            if self.fail_start {
                return Err(HostError::Unavailable("test".into()));
            }
            Ok(())
        }

        fn stop_service(&mut self) -> Result<(), HostError> {
            self.calls.push("stop");
            Ok(())
        }
    }

    fn store(enabled: bool, on_power_save: bool) -> MemoryStore {
        MemoryStore::with_settings(Settings {
            enabled,
            enabled_on_power_save: on_power_save,
            pattern_id: 3,
            shift_speed_level: 4,
        })
    }

    #[test]
    fn test_decision_table() {
        use Action::*;
        #[rustfmt::skip]
        let table = [
            // enabled, on_power_save, power_saving, running, action
            (false, true,  true,  false, Start),
            (false, true,  false, true,  Stop),
            (false, true,  true,  true,  Restart),
            (false, true,  false, false, None),
            (true,  false, false, false, Start),
            (true,  false, true,  false, Start),
            (true,  true,  false, false, Start),
            (true,  true,  true,  false, Start),
            (false, false, false, true,  Stop),
            (false, false, true,  true,  Stop),
            (false, false, false, false, None),
            (false, false, true,  false, None),
            (true,  false, false, true,  Restart),
            (true,  false, true,  true,  Restart),
            (true,  true,  false, true,  Restart),
            (true,  true,  true,  true,  Restart),
        ];
        for (enabled, on_ps, ps, running, expected) in table {
            assert_eq!(
                decide(enabled, on_ps, ps, running),
                expected,
                "enabled={enabled} on_ps={on_ps} ps={ps} running={running}"
            );
        }
    }

    #[test]
    fn test_power_save_start_and_stop() {
        let store = store(false, true);
        let mut power = SimulatedPower::new();
        let mut host = RecordingHost::default();
        let mut watcher = SettingsWatcher::new();

        assert_eq!(watcher.update(&store, &mut power, &mut host), Action::None);
        assert!(power.is_receiver_registered());

        power.set_power_save(true);
        assert!(power.poll());
        assert_eq!(watcher.update(&store, &mut power, &mut host), Action::Start);
        assert!(watcher.service_running());

        power.set_power_save(false);
        assert_eq!(watcher.update(&store, &mut power, &mut host), Action::Stop);
        assert!(!watcher.service_running());
        assert_eq!(host.calls, ["start", "stop"]);
    }

    #[test]
    fn test_enable_while_running_restarts() {
        let mut store = store(false, true);
        let mut power = SimulatedPower::new();
        power.set_power_save(true);
        let mut host = RecordingHost::default();
        let mut watcher = SettingsWatcher::new();
        watcher.update(&store, &mut power, &mut host);
        host.calls.clear();

        store.put_bool(KEY_ENABLE, true).unwrap();
        assert_eq!(watcher.update(&store, &mut power, &mut host), Action::Restart);
        assert_eq!(host.calls, ["stop", "start"]);
        assert!(watcher.service_running());
    }

    #[test]
    fn test_receiver_dropped_when_fully_disabled() {
        let mut store = store(true, false);
        let mut power = SimulatedPower::new();
        let mut host = RecordingHost::default();
        let mut watcher = SettingsWatcher::new();
        watcher.update(&store, &mut power, &mut host);
        assert!(power.is_receiver_registered());

        store.put_bool(KEY_ENABLE, false).unwrap();
        assert_eq!(watcher.update(&store, &mut power, &mut host), Action::Stop);
        assert!(!power.is_receiver_registered());
        assert_eq!(power.registrations(), 1);
    }

    #[test]
    fn test_failed_start_keeps_previous_state() {
        let store = store(true, false);
        let mut power = SimulatedPower::new();
        let mut host = RecordingHost {
            fail_start: true,
            ..Default::default()
        };
        let mut watcher = SettingsWatcher::new();

        assert_eq!(watcher.update(&store, &mut power, &mut host), Action::Start);
        assert!(!watcher.service_running());

        // Next notification tries again from scratch.
        host.fail_start = false;
        assert_eq!(watcher.update(&store, &mut power, &mut host), Action::Start);
        assert!(watcher.service_running());
    }
}
