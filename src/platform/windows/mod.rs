// Windows backend: hidden host window that turns tray, hotkey, power and
// display messages into daemon events, plus the overlay compositor and
// battery saver monitor.

mod compositor;
mod hotkeys;
mod power;
mod tray;

pub use compositor::Win32Compositor;
pub use power::Win32Power;

use std::cell::RefCell;
use std::path::Path;

use tokio::sync::mpsc::UnboundedSender;
use windows::core::{GUID, PCWSTR};
use windows::Win32::Foundation::{HANDLE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Power::{
    RegisterPowerSettingNotification, UnregisterPowerSettingNotification, HPOWERNOTIFY,
    POWERBROADCAST_SETTING,
};
use windows::Win32::System::RemoteDesktop::{
    WTSRegisterSessionNotification, WTSUnRegisterSessionNotification,
};
use windows::Win32::System::Threading::{CreateMutexW, OpenMutexW, SYNCHRONIZATION_ACCESS_RIGHTS};
use windows::Win32::UI::Shell::ShellExecuteW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, PeekMessageW,
    RegisterClassW, TranslateMessage, DEVICE_NOTIFY_WINDOW_HANDLE, MSG, PBT_APMRESUMEAUTOMATIC,
    PBT_APMSUSPEND, PM_REMOVE,
    SW_SHOWNORMAL, WINDOW_EX_STYLE, WM_COMMAND, WM_DISPLAYCHANGE, WM_HOTKEY, WM_LBUTTONUP,
    WM_POWERBROADCAST, WM_QUIT, WM_RBUTTONUP, WNDCLASSW, WS_OVERLAPPED,
};

use crate::daemon::HostEvent;
use crate::error::HostError;

const HOST_CLASS_NAME: &str = "SmartPixelsHost";
const SINGLE_INSTANCE_MUTEX: &str = "SmartPixelsMutex";

// Monitor on/off/dimmed, delivered as PBT_POWERSETTINGCHANGE
const GUID_CONSOLE_DISPLAY_STATE: GUID = GUID::from_u128(0x6fe69556_704a_47a0_8f24_c28d936fda47);
const PBT_POWERSETTINGCHANGE: u32 = 0x8013;

// Session change notifications
const WM_WTSSESSION_CHANGE: u32 = 0x02B1;
const NOTIFY_FOR_THIS_SESSION: u32 = 0;
const WTS_CONSOLE_CONNECT: u32 = 0x1;
const WTS_SESSION_LOGON: u32 = 0x5;
const WTS_SESSION_UNLOCK: u32 = 0x8;

thread_local! {
    static EVENTS: RefCell<Option<UnboundedSender<HostEvent>>> = const { RefCell::new(None) };
}

pub(crate) fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn send(event: HostEvent) {
    EVENTS.with(|tx| {
        if let Some(tx) = tx.borrow().as_ref() {
            let _ = tx.send(event);
        }
    });
}

/// Check if another instance is already running
pub fn is_already_running() -> bool {
    let name = wide(SINGLE_INSTANCE_MUTEX);
    unsafe {
        let existing = OpenMutexW(
            SYNCHRONIZATION_ACCESS_RIGHTS(0x001F0001), // MUTEX_ALL_ACCESS
            false,
            PCWSTR(name.as_ptr()),
        );
        if existing.is_ok() {
            return true;
        }
        // Held by this process until exit
        let _ = CreateMutexW(None, true, PCWSTR(name.as_ptr()));
        false
    }
}

/// Open `path` with its associated program
pub fn open_path(path: &Path) {
    let target = wide(&path.to_string_lossy());
    let verb = wide("open");
    let result = unsafe {
        ShellExecuteW(
            None,
            PCWSTR(verb.as_ptr()),
            PCWSTR(target.as_ptr()),
            None,
            None,
            SW_SHOWNORMAL,
        )
    };
    // Values above 32 mean success
    if result.0 as isize <= 32 {
        tracing::warn!(path = %path.display(), "Could not open settings file");
    }
}

/// Console display state: 0 is off, 1 on, 2 dimmed (still visible)
fn display_interactive(state: u8) -> Option<bool> {
    match state {
        0 => Some(false),
        1 | 2 => Some(true),
        _ => None,
    }
}

/// Session changes that can bring a different user to the foreground
fn session_event(change: u32) -> Option<HostEvent> {
    match change {
        WTS_CONSOLE_CONNECT | WTS_SESSION_LOGON | WTS_SESSION_UNLOCK => {
            Some(HostEvent::UserForeground)
        }
        _ => None,
    }
}

unsafe fn power_setting_event(lparam: LPARAM) -> Option<HostEvent> {
    let setting = (lparam.0 as *const POWERBROADCAST_SETTING).as_ref()?;
    if setting.PowerSetting != GUID_CONSOLE_DISPLAY_STATE || setting.DataLength < 1 {
        return None;
    }
    display_interactive(setting.Data[0]).map(HostEvent::DisplayInteractive)
}

unsafe extern "system" fn host_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_COMMAND => {
            match (wparam.0 & 0xFFFF) as u32 {
                tray::IDM_TOGGLE => send(HostEvent::TileClicked),
                tray::IDM_SETTINGS => send(HostEvent::OpenSettings),
                tray::IDM_QUIT => send(HostEvent::Quit),
                _ => {}
            }
            LRESULT(0)
        }
        tray::WM_TRAY_ICON => {
            match (lparam.0 & 0xFFFF) as u32 {
                WM_LBUTTONUP => send(HostEvent::TileClicked),
                WM_RBUTTONUP => tray::show_context_menu(hwnd),
                _ => {}
            }
            LRESULT(0)
        }
        WM_HOTKEY => {
            if wparam.0 as i32 == hotkeys::HOTKEY_TOGGLE {
                send(HostEvent::TileClicked);
            }
            LRESULT(0)
        }
        WM_DISPLAYCHANGE => {
            send(HostEvent::ConfigurationChanged);
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        WM_POWERBROADCAST => {
            match wparam.0 as u32 {
                PBT_APMSUSPEND => send(HostEvent::DisplayInteractive(false)),
                PBT_APMRESUMEAUTOMATIC => send(HostEvent::DisplayInteractive(true)),
                PBT_POWERSETTINGCHANGE => {
                    if let Some(event) = power_setting_event(lparam) {
                        send(event);
                    }
                }
                _ => {}
            }
            LRESULT(1)
        }
        WM_WTSSESSION_CHANGE => {
            if let Some(event) = session_event(wparam.0 as u32) {
                send(event);
            }
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Hidden top-level window owning the tray icon and hotkey. It has to be
/// top-level to receive power and display broadcasts.
pub struct HostWindow {
    hwnd: HWND,
    display_notify: Option<HPOWERNOTIFY>,
}

impl HostWindow {
    pub fn create(events: UnboundedSender<HostEvent>, active: bool) -> Result<Self, HostError> {
        let class_name = wide(HOST_CLASS_NAME);
        let title = wide("Smart Pixels");

        let hwnd = unsafe {
            let hinstance = GetModuleHandleW(PCWSTR::null())
                .map_err(|e| HostError::Unavailable(e.to_string()))?;
            let wc = WNDCLASSW {
                lpfnWndProc: Some(host_proc),
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                ..Default::default()
            };
            RegisterClassW(&wc);

            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                PCWSTR(class_name.as_ptr()),
                PCWSTR(title.as_ptr()),
                WS_OVERLAPPED,
                0,
                0,
                0,
                0,
                None,
                None,
                Some(hinstance.into()),
                None,
            )
            .map_err(|e| HostError::Unavailable(e.to_string()))?
        };

        EVENTS.with(|tx| *tx.borrow_mut() = Some(events));
        if !tray::add_tray_icon(hwnd, active) {
            tracing::warn!("Tray icon could not be added");
        }
        hotkeys::register(hwnd);

        let display_notify = unsafe {
            RegisterPowerSettingNotification(
                HANDLE(hwnd.0),
                &GUID_CONSOLE_DISPLAY_STATE,
                DEVICE_NOTIFY_WINDOW_HANDLE,
            )
        };
        let display_notify = match display_notify {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Display on/off will not be tracked");
                None
            }
        };
        if let Err(e) = unsafe { WTSRegisterSessionNotification(hwnd, NOTIFY_FOR_THIS_SESSION) } {
            tracing::warn!(error = %e, "Session changes will not be tracked");
        }

        tracing::debug!("Host window created");
        Ok(Self {
            hwnd,
            display_notify,
        })
    }

    /// Reflect the toggle state in the tray tooltip
    pub fn set_active(&self, active: bool) {
        tray::update_tray_icon(self.hwnd, active);
    }
}

impl Drop for HostWindow {
    fn drop(&mut self) {
        hotkeys::unregister(self.hwnd);
        tray::remove_tray_icon(self.hwnd);
        unsafe {
            if let Some(handle) = self.display_notify.take() {
                let _ = UnregisterPowerSettingNotification(handle);
            }
            let _ = WTSUnRegisterSessionNotification(self.hwnd);
            let _ = DestroyWindow(self.hwnd);
        }
        EVENTS.with(|tx| *tx.borrow_mut() = None);
    }
}

/// Dispatch every queued window message without blocking
pub fn pump() {
    unsafe {
        let mut msg = MSG::default();
        while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
            if msg.message == WM_QUIT {
                send(HostEvent::Quit);
                continue;
            }
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_state_mapping() {
        assert_eq!(display_interactive(0), Some(false));
        assert_eq!(display_interactive(1), Some(true));
        // Dimmed is still showing content
        assert_eq!(display_interactive(2), Some(true));
        assert_eq!(display_interactive(7), None);
    }

    #[test]
    fn test_display_off_broadcast_becomes_event() {
        let setting = POWERBROADCAST_SETTING {
            PowerSetting: GUID_CONSOLE_DISPLAY_STATE,
            DataLength: 4,
            Data: [0],
        };
        let lparam = LPARAM(&setting as *const _ as isize);
        assert_eq!(
            unsafe { power_setting_event(lparam) },
            Some(HostEvent::DisplayInteractive(false))
        );

        let other = POWERBROADCAST_SETTING {
            PowerSetting: GUID::from_u128(1),
            ..setting
        };
        let lparam = LPARAM(&other as *const _ as isize);
        assert_eq!(unsafe { power_setting_event(lparam) }, None);
    }

    #[test]
    fn test_session_changes_map_to_user_foreground() {
        for change in [WTS_CONSOLE_CONNECT, WTS_SESSION_LOGON, WTS_SESSION_UNLOCK] {
            assert_eq!(session_event(change), Some(HostEvent::UserForeground));
        }
        // Lock and disconnect leave the current user in place
        assert_eq!(session_event(0x7), None);
        assert_eq!(session_event(0x2), None);
    }
}
