// Global toggle hotkey using Win32 RegisterHotKey API

use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, HOT_KEY_MODIFIERS, MOD_ALT, MOD_CONTROL, MOD_NOREPEAT,
    VK_END,
};

/// Ctrl+Alt+End, same as clicking the tray icon
pub const HOTKEY_TOGGLE: i32 = 1;

/// Register the toggle hotkey on `hwnd`. Returns false if another program
/// already owns the combination.
pub fn register(hwnd: HWND) -> bool {
    let mods = HOT_KEY_MODIFIERS(MOD_CONTROL.0 | MOD_ALT.0 | MOD_NOREPEAT.0);
    let ok = unsafe { RegisterHotKey(Some(hwnd), HOTKEY_TOGGLE, mods, VK_END.0 as u32).is_ok() };
    if !ok {
        tracing::warn!("Ctrl+Alt+End is taken, toggle hotkey disabled");
    }
    ok
}

pub fn unregister(hwnd: HWND) {
    unsafe {
        let _ = UnregisterHotKey(Some(hwnd), HOTKEY_TOGGLE);
    }
}
