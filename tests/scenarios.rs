use smartpixels::compositor::{DisplayMetrics, FramebufferCompositor};
use smartpixels::config::{MemoryStore, Settings, SettingsStore, KEY_ENABLE};
use smartpixels::daemon::{Daemon, HostEvent};
use smartpixels::power::{PowerMonitor, SimulatedPower};
use smartpixels::scheduler::{Firing, ManualTimer};
use smartpixels::service::OverlayService;
use smartpixels::watcher::Action;

const METRICS: DisplayMetrics = DisplayMetrics {
    width: 48,
    height: 32,
    status_bar_height: 2,
};

type TestDaemon = Daemon<MemoryStore, SimulatedPower, FramebufferCompositor, ManualTimer>;

fn power_save_only() -> Settings {
    Settings {
        enabled: false,
        enabled_on_power_save: true,
        pattern_id: 3,
        shift_speed_level: 4,
    }
}

fn daemon(settings: Settings) -> TestDaemon {
    Daemon::new(
        MemoryStore::with_settings(settings),
        SimulatedPower::new(),
        OverlayService::new(FramebufferCompositor::new(METRICS), ManualTimer::new()),
    )
}

#[test]
fn power_save_on_starts_overlay() {
    let mut daemon = daemon(power_save_only());
    assert_eq!(daemon.evaluate(), Action::None);
    assert!(daemon.power().is_receiver_registered());

    daemon.power_mut().set_power_save(true);
    assert_eq!(daemon.evaluate(), Action::Start);
    assert!(daemon.watcher().service_running());
    assert!(daemon.service().overlay().is_started());
    assert_eq!(daemon.service().overlay().compositor().stats().attaches, 1);
}

#[test]
fn power_save_off_stops_overlay_and_silences_timer() {
    let mut daemon = daemon(power_save_only());
    daemon.power_mut().set_power_save(true);
    daemon.evaluate();
    let (_, pending) = daemon.service_mut().timer_mut().take_next().unwrap();

    daemon.power_mut().set_power_save(false);
    assert_eq!(daemon.evaluate(), Action::Stop);
    assert!(!daemon.watcher().service_running());

    // A firing that was already queued before the stop does nothing
    let firing = daemon.service_mut().on_shift_tick(pending, true, 60_000);
    assert_eq!(firing, Firing::Stale);
    let stats = daemon.service().overlay().compositor().stats();
    assert_eq!(stats.redraws, 0);
    assert_eq!(stats.detaches, 1);
    assert_eq!(daemon.service_mut().timer_mut().pending(), 0);
}

#[test]
fn enabling_while_running_restarts() {
    let mut daemon = daemon(power_save_only());
    daemon.power_mut().set_power_save(true);
    daemon.evaluate();

    daemon.store_mut().put_bool(KEY_ENABLE, true).unwrap();
    assert_eq!(daemon.evaluate(), Action::Restart);

    // Old surface released before the new one was attached
    let compositor = daemon.service().overlay().compositor();
    assert_eq!(compositor.stats().attaches, 2);
    assert_eq!(compositor.stats().detaches, 1);
    assert_eq!(compositor.surface_count(), 1);
    assert!(daemon.watcher().service_running());
}

#[test]
fn tick_from_previous_run_does_not_repaint_new_overlay() {
    let mut daemon = daemon(Settings {
        enabled: true,
        ..Settings::default()
    });
    daemon.evaluate();
    let (_, old) = daemon.service_mut().timer_mut().take_next().unwrap();

    // Restart through a settings change
    daemon.store_mut().put_int("pattern", 5).unwrap();
    daemon.handle(HostEvent::PowerSaveChanged);
    assert_eq!(daemon.service().overlay().pattern(), 5);

    daemon.handle(HostEvent::ShiftTick(old));
    assert_eq!(daemon.service().overlay().compositor().stats().redraws, 0);

    let (_, fresh) = daemon.service_mut().timer_mut().take_next().unwrap();
    daemon.handle(HostEvent::ShiftTick(fresh));
    assert_eq!(daemon.service().overlay().compositor().stats().redraws, 1);
}

#[test]
fn rotation_relayouts_running_overlay() {
    let mut daemon = daemon(Settings {
        enabled: true,
        ..Settings::default()
    });
    daemon.evaluate();

    daemon
        .service_mut()
        .overlay_mut()
        .compositor_mut()
        .set_metrics(DisplayMetrics {
            width: 32,
            height: 48,
            status_bar_height: 2,
        });
    daemon.handle(HostEvent::ConfigurationChanged);

    let geometry = daemon.service().overlay().geometry().unwrap();
    assert_eq!((geometry.width, geometry.height), (36, 52));
    assert_eq!(daemon.service().overlay().compositor().stats().layouts, 1);
}

#[test]
fn toggle_during_power_save_turns_everything_off() {
    let mut daemon = daemon(power_save_only());
    daemon.power_mut().set_power_save(true);
    daemon.evaluate();
    assert!(daemon.tile_active());

    daemon.handle(HostEvent::TileClicked);
    assert!(!daemon.tile_active());
    assert!(!daemon.service().is_running());
    assert!(!daemon.power().is_receiver_registered());
    assert!(!Settings::read(daemon.store()).enabled_on_power_save);
}
