// Prevents console window in release builds
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use std::path::PathBuf;
use std::time::Duration;

use smartpixels::daemon::{Daemon, HostEvent};
use smartpixels::logging;
use smartpixels::scheduler::TokioTimer;
use smartpixels::service::OverlayService;
use smartpixels::store::{self, JsonStore, SettingsFileWatcher};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let path = store::settings_path();
    let store = JsonStore::open(&path);
    logging::init(store.debug_logging());
    tracing::info!(
        path = %path.display(),
        user = store.current_user(),
        "Smart Pixels starting"
    );

    // Create the file up front so there is something to open and edit
    if !path.exists() {
        if let Err(e) = store.save() {
            tracing::warn!(error = %e, "Could not create settings file");
        }
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let watch_tx = tx.clone();
    let _file_watcher = match SettingsFileWatcher::new(&path, move || {
        let _ = watch_tx.send(HostEvent::SettingsFileChanged);
    }) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Settings file edits will not be picked up");
            None
        }
    };

    run(store, path, tx, rx).await;
    tracing::info!("Smart Pixels stopped");
}

#[cfg(windows)]
async fn run(
    store: JsonStore,
    path: PathBuf,
    tx: UnboundedSender<HostEvent>,
    rx: UnboundedReceiver<HostEvent>,
) {
    use smartpixels::platform::windows::{self as win, HostWindow, Win32Compositor, Win32Power};
    use std::rc::Rc;

    if win::is_already_running() {
        tracing::info!("Another instance is already running");
        return;
    }

    let host = match HostWindow::create(tx.clone(), false) {
        Ok(host) => Rc::new(host),
        Err(e) => {
            tracing::error!(error = %e, "Could not create host window");
            return;
        }
    };
    let tray = Rc::clone(&host);

    let service = OverlayService::new(Win32Compositor::new(), TokioTimer::new(tx));
    let daemon = Daemon::new(store, Win32Power::new(), service)
        .with_settings_opener(move || win::open_path(&path))
        .with_state_listener(move |active| tray.set_active(active));

    // Short tick: window messages are only dispatched from here
    daemon.run(rx, Duration::from_millis(50), win::pump).await;
}

#[cfg(not(windows))]
async fn run(
    store: JsonStore,
    path: PathBuf,
    tx: UnboundedSender<HostEvent>,
    rx: UnboundedReceiver<HostEvent>,
) {
    use smartpixels::platform::desktop;
    use smartpixels::power::SysfsPower;

    let compositor = native_compositor();
    forward_signals(tx.clone());

    let service = OverlayService::new(compositor, TokioTimer::new(tx));
    let daemon = Daemon::new(store, SysfsPower::new(), service)
        .with_settings_opener(move || desktop::open_with_default_app(&path));

    daemon.run(rx, Duration::from_secs(1), || {}).await;
}

#[cfg(target_os = "linux")]
fn native_compositor() -> smartpixels::compositor::FramebufferCompositor {
    use smartpixels::compositor::FramebufferCompositor;
    use smartpixels::platform::fbdev::{FbDevice, FB_DEVICE, FB_SYSFS_DIR};

    match FbDevice::open(FB_SYSFS_DIR, FB_DEVICE) {
        Ok(fb) => FramebufferCompositor::with_sink(fb.metrics(), fb),
        Err(e) => {
            tracing::warn!(error = %e, "No usable framebuffer, overlay cannot be shown");
            FramebufferCompositor::without_display()
        }
    }
}

#[cfg(all(not(windows), not(target_os = "linux")))]
fn native_compositor() -> smartpixels::compositor::FramebufferCompositor {
    tracing::warn!("No overlay backend for this platform, overlay cannot be shown");
    smartpixels::compositor::FramebufferCompositor::without_display()
}

/// Ctrl+C and SIGTERM quit, SIGUSR1 acts as the toggle
#[cfg(unix)]
fn forward_signals(tx: UnboundedSender<HostEvent>) {
    use tokio::signal::unix::{signal, SignalKind};

    let watch = |kind: SignalKind, event: HostEvent| {
        let tx = tx.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    while stream.recv().await.is_some() {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                });
            }
            Err(e) => tracing::warn!(error = %e, "Could not install signal handler"),
        }
    };
    watch(SignalKind::interrupt(), HostEvent::Quit);
    watch(SignalKind::terminate(), HostEvent::Quit);
    watch(SignalKind::user_defined1(), HostEvent::TileClicked);
}

#[cfg(all(not(windows), not(unix)))]
fn forward_signals(tx: UnboundedSender<HostEvent>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(HostEvent::Quit);
        }
    });
}
