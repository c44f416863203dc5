// Event loop: every notification, timer firing and configuration change is
// funnelled through one channel and handled on one thread.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;

use crate::compositor::Compositor;
use crate::config::{Reload, Settings, SettingsStore};
use crate::power::PowerMonitor;
use crate::renderer;
use crate::scheduler::{Firing, Tick, Timer};
use crate::service::{OverlayService, ServiceHost};
use crate::tile;
use crate::watcher::{Action, SettingsWatcher};

/// Everything the hosting environment can tell the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The settings file was touched on disk
    SettingsFileChanged,
    PowerSaveChanged,
    /// Another user took over the session
    UserForeground,
    /// Display size or rotation changed
    ConfigurationChanged,
    /// Display went to sleep (`false`) or woke up (`true`)
    DisplayInteractive(bool),
    ShiftTick(Tick),
    TileClicked,
    OpenSettings,
    Quit,
}

impl From<Tick> for HostEvent {
    fn from(tick: Tick) -> Self {
        HostEvent::ShiftTick(tick)
    }
}

pub struct Daemon<S, P, C, T>
where
    S: SettingsStore,
    P: PowerMonitor,
    C: Compositor,
    T: Timer,
{
    store: S,
    power: P,
    watcher: SettingsWatcher,
    service: OverlayService<C, T>,
    display_on: bool,
    open_settings: Option<Box<dyn FnMut()>>,
    on_state: Option<Box<dyn FnMut(bool)>>,
}

impl<S, P, C, T> Daemon<S, P, C, T>
where
    S: SettingsStore,
    P: PowerMonitor,
    C: Compositor,
    T: Timer,
{
    pub fn new(store: S, power: P, service: OverlayService<C, T>) -> Self {
        Self {
            store,
            power,
            watcher: SettingsWatcher::new(),
            service,
            display_on: true,
            open_settings: None,
            on_state: None,
        }
    }

    /// What `HostEvent::OpenSettings` should do
    pub fn with_settings_opener(mut self, open: impl FnMut() + 'static) -> Self {
        self.open_settings = Some(Box::new(open));
        self
    }

    /// Told the toggle state after every evaluation
    pub fn with_state_listener(mut self, listener: impl FnMut(bool) + 'static) -> Self {
        self.on_state = Some(Box::new(listener));
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn power(&self) -> &P {
        &self.power
    }

    pub fn power_mut(&mut self) -> &mut P {
        &mut self.power
    }

    pub fn service(&self) -> &OverlayService<C, T> {
        &self.service
    }

    pub fn service_mut(&mut self) -> &mut OverlayService<C, T> {
        &mut self.service
    }

    pub fn watcher(&self) -> &SettingsWatcher {
        &self.watcher
    }

    /// State the toggle should display
    pub fn tile_active(&self) -> bool {
        tile::is_active(&Settings::read(&self.store), self.power.is_power_save_mode())
    }

    fn interactive(&self) -> bool {
        self.display_on && self.power.is_interactive()
    }

    /// Re-read settings and power state and reconcile the service.
    pub fn evaluate(&mut self) -> Action {
        let action = self
            .watcher
            .update(&self.store, &mut self.power, &mut self.service);
        let active = self.tile_active();
        if let Some(listener) = self.on_state.as_mut() {
            listener(active);
        }
        action
    }

    /// Handle one event. Returns false once the daemon should exit.
    pub fn handle(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::SettingsFileChanged => match self.store.reload() {
                Ok(Reload::Unchanged) => {}
                Ok(Reload::Changed) => {
                    self.evaluate();
                }
                Ok(Reload::UserSwitched) => {
                    tracing::info!("Foreground user changed");
                    self.evaluate();
                }
                Err(e) => tracing::warn!(error = %e, "Ignoring unreadable settings file"),
            },
            HostEvent::PowerSaveChanged | HostEvent::UserForeground => {
                self.evaluate();
            }
            HostEvent::ConfigurationChanged => self.service.on_configuration_changed(),
            HostEvent::DisplayInteractive(on) => {
                tracing::debug!(on, "Display state");
                self.display_on = on;
            }
            HostEvent::ShiftTick(tick) => {
                let firing =
                    self.service
                        .on_shift_tick(tick, self.interactive(), renderer::now_ms());
                if let Firing::Shifted { offset } = firing {
                    tracing::trace!(offset, "Pattern shifted");
                }
            }
            HostEvent::TileClicked => {
                let power_saving = self.power.is_power_save_mode();
                match tile::activate(&mut self.store, power_saving) {
                    Ok(true) => {
                        self.evaluate();
                    }
                    Ok(false) => {}
                    Err(e) => tracing::error!(error = %e, "Failed to save toggle"),
                }
            }
            HostEvent::OpenSettings => match self.open_settings.as_mut() {
                Some(open) => open(),
                None => tracing::debug!("No settings opener configured"),
            },
            HostEvent::Quit => {
                if let Err(e) = self.service.stop_service() {
                    tracing::warn!(error = %e, "Failed to stop overlay service");
                }
                return false;
            }
        }
        true
    }

    /// Refresh polled platform state and act on what changed.
    pub fn poll(&mut self) {
        if self.power.poll() {
            self.handle(HostEvent::PowerSaveChanged);
        }
    }

    /// Evaluate once, then serve events until `Quit`. `pump` runs on every
    /// poll tick before polled sources are read.
    pub async fn run(
        mut self,
        mut rx: UnboundedReceiver<HostEvent>,
        poll_every: Duration,
        mut pump: impl FnMut(),
    ) -> Self {
        self.evaluate();

        let mut poll = tokio::time::interval(poll_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("Event channel closed");
                        break;
                    };
                    if !self.handle(event) {
                        break;
                    }
                }
                _ = poll.tick() => {
                    pump();
                    self.poll();
                }
            }
        }
        tracing::info!("Event loop finished");
        self
    }
}
