// Tray icon: left click toggles, right click opens the menu

use windows::core::PCWSTR;
use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, DestroyMenu, GetCursorPos, LoadIconW, SetForegroundWindow,
    TrackPopupMenu, IDI_APPLICATION, MF_SEPARATOR, MF_STRING, TPM_BOTTOMALIGN, TPM_LEFTALIGN,
    WM_APP,
};

use super::wide;

/// Callback message for tray icon events
pub const WM_TRAY_ICON: u32 = WM_APP + 1;

pub const IDM_TOGGLE: u32 = 1001;
pub const IDM_SETTINGS: u32 = 1002;
pub const IDM_QUIT: u32 = 1003;

const TRAY_ID: u32 = 1;

fn icon_data(hwnd: HWND) -> NOTIFYICONDATAW {
    NOTIFYICONDATAW {
        cbSize: std::mem::size_of::<NOTIFYICONDATAW>() as u32,
        hWnd: hwnd,
        uID: TRAY_ID,
        ..Default::default()
    }
}

fn set_tip(nid: &mut NOTIFYICONDATAW, text: &str) {
    let tip = wide(text);
    let len = tip.len().min(nid.szTip.len());
    nid.szTip[..len].copy_from_slice(&tip[..len]);
}

fn tip_text(active: bool) -> &'static str {
    if active {
        "Smart Pixels (on)"
    } else {
        "Smart Pixels (off)"
    }
}

pub fn add_tray_icon(hwnd: HWND, active: bool) -> bool {
    let mut nid = icon_data(hwnd);
    nid.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP;
    nid.uCallbackMessage = WM_TRAY_ICON;
    if let Ok(icon) = unsafe { LoadIconW(None, IDI_APPLICATION) } {
        nid.hIcon = icon;
    }
    set_tip(&mut nid, tip_text(active));
    unsafe { Shell_NotifyIconW(NIM_ADD, &nid).as_bool() }
}

/// Refresh the tooltip after the toggle state changed
pub fn update_tray_icon(hwnd: HWND, active: bool) {
    let mut nid = icon_data(hwnd);
    nid.uFlags = NIF_TIP;
    set_tip(&mut nid, tip_text(active));
    unsafe {
        let _ = Shell_NotifyIconW(NIM_MODIFY, &nid);
    }
}

pub fn remove_tray_icon(hwnd: HWND) {
    let nid = icon_data(hwnd);
    unsafe {
        let _ = Shell_NotifyIconW(NIM_DELETE, &nid);
    }
}

pub fn show_context_menu(hwnd: HWND) {
    let Ok(menu) = (unsafe { CreatePopupMenu() }) else {
        tracing::warn!("Could not create tray menu");
        return;
    };
    let toggle_text = wide("Toggle Smart Pixels");
    let settings_text = wide("Settings");
    let quit_text = wide("Quit");

    unsafe {
        let _ = AppendMenuW(
            menu,
            MF_STRING,
            IDM_TOGGLE as usize,
            PCWSTR(toggle_text.as_ptr()),
        );
        let _ = AppendMenuW(
            menu,
            MF_STRING,
            IDM_SETTINGS as usize,
            PCWSTR(settings_text.as_ptr()),
        );
        let _ = AppendMenuW(menu, MF_SEPARATOR, 0, PCWSTR::null());
        let _ = AppendMenuW(menu, MF_STRING, IDM_QUIT as usize, PCWSTR(quit_text.as_ptr()));

        let mut pt = POINT::default();
        let _ = GetCursorPos(&mut pt);

        // Required for TrackPopupMenu to dismiss correctly from the tray
        let _ = SetForegroundWindow(hwnd);

        let _ = TrackPopupMenu(
            menu,
            TPM_LEFTALIGN | TPM_BOTTOMALIGN,
            pt.x,
            pt.y,
            Some(0),
            hwnd,
            None,
        );

        let _ = DestroyMenu(menu);
    }
}
