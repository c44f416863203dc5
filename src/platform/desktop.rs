// Non-Windows desktop helpers: hand the settings file to the user's
// default application.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};
use std::thread::JoinHandle;

/// Start `command` and wait for it on a helper thread, so the child is
/// reaped without blocking the event loop.
pub fn spawn_reaped(mut command: Command) -> io::Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = command.spawn()?;
    std::thread::Builder::new()
        .name("reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) => {
                if !status.success() {
                    tracing::debug!(%status, "Opener exited with failure");
                }
                Some(status)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not wait for opener");
                None
            }
        })
}

/// Open `path` with `xdg-open` (or `open` on macOS)
pub fn open_with_default_app(path: &Path) {
    let opener = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let mut command = Command::new(opener);
    command.arg(path);
    if let Err(e) = spawn_reaped(command) {
        tracing::warn!(error = %e, path = %path.display(), "Could not open settings file");
    }
}
