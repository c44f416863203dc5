// Overlay service: the hosted unit that the settings watcher starts and
// stops. Creating it starts the overlay and its shift schedule; destroying
// it tears both down. Configuration changes and timer firings are routed
// in by the event loop.

use crate::compositor::Compositor;
use crate::config::Settings;
use crate::error::HostError;
use crate::overlay::OverlayLifecycle;
use crate::patterns;
use crate::renderer;
use crate::scheduler::{Firing, ShiftScheduler, Tick, Timer};

/// Starts and stops the overlay service on behalf of the settings watcher
pub trait ServiceHost {
    fn start_service(&mut self, settings: &Settings) -> Result<(), HostError>;

    fn stop_service(&mut self) -> Result<(), HostError>;
}

pub struct OverlayService<C: Compositor, T: Timer> {
    overlay: OverlayLifecycle<C>,
    scheduler: ShiftScheduler,
    timer: T,
}

impl<C: Compositor, T: Timer> OverlayService<C, T> {
    pub fn new(compositor: C, timer: T) -> Self {
        let defaults = Settings::default();
        Self {
            overlay: OverlayLifecycle::new(compositor, defaults.pattern_id),
            scheduler: ShiftScheduler::new(patterns::shift_interval(defaults.shift_speed_level)),
            timer,
        }
    }

    /// Whether the service is currently created and showing the overlay
    pub fn is_running(&self) -> bool {
        self.overlay.is_started()
    }

    pub fn overlay(&self) -> &OverlayLifecycle<C> {
        &self.overlay
    }

    pub fn overlay_mut(&mut self) -> &mut OverlayLifecycle<C> {
        &mut self.overlay
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Apply `settings`, start the overlay and arm the first shift.
    pub fn on_create(&mut self, settings: &Settings) -> Result<(), HostError> {
        if self.is_running() {
            return Ok(());
        }
        let interval = patterns::shift_interval(settings.shift_speed_level);
        self.scheduler = ShiftScheduler::new(interval);
        self.overlay.set_pattern(settings.pattern_id);

        if let Err(e) = self.overlay.start(renderer::current_offset(interval)) {
            tracing::warn!(error = %e, "Overlay could not be shown");
            return Err(e.into());
        }
        self.scheduler.arm(&self.overlay, &mut self.timer);
        tracing::info!(
            pattern = settings.pattern_id,
            interval_secs = interval.as_secs(),
            "Overlay service created"
        );
        Ok(())
    }

    pub fn on_destroy(&mut self) {
        if !self.is_running() {
            return;
        }
        self.overlay.stop();
        self.timer.cancel();
        tracing::info!("Overlay service destroyed");
    }

    pub fn on_configuration_changed(&mut self) {
        if let Err(e) = self.overlay.on_configuration_changed() {
            tracing::warn!(error = %e, "Failed to update overlay layout");
        }
    }

    pub fn on_shift_tick(&mut self, tick: Tick, interactive: bool, now_ms: u64) -> Firing {
        self.scheduler
            .on_fire(tick, &mut self.overlay, interactive, now_ms, &mut self.timer)
    }
}

impl<C: Compositor, T: Timer> ServiceHost for OverlayService<C, T> {
    fn start_service(&mut self, settings: &Settings) -> Result<(), HostError> {
        self.on_create(settings)
    }

    fn stop_service(&mut self) -> Result<(), HostError> {
        self.on_destroy();
        Ok(())
    }
}
