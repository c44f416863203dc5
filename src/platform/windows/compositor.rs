// Overlay surfaces as layered, click-through, topmost popup windows.
//
// The dither tile becomes a monochrome GDI pattern brush. Opaque cells are
// painted black, transparent cells in a colour key that the layered window
// drops, so the desktop shows through them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;

use tiny_skia::Pixmap;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateBitmap, CreatePatternBrush, DeleteObject, EndPaint, FillRect,
    InvalidateRect, SetBkColor, SetTextColor, HBRUSH, PAINTSTRUCT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GetSystemMetrics, RegisterClassW,
    SetLayeredWindowAttributes, SetWindowPos, ShowWindow, CS_HREDRAW, CS_VREDRAW, HWND_TOPMOST,
    LWA_COLORKEY, SM_CXSCREEN, SM_CYSCREEN, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSENDCHANGING,
    SWP_NOSIZE, SW_HIDE, SW_SHOWNOACTIVATE, WINDOW_EX_STYLE, WM_ERASEBKGND, WM_PAINT, WNDCLASSW,
    WS_DISABLED, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_EX_TRANSPARENT, WS_POPUP,
};

use super::wide;
use crate::compositor::{Compositor, DisplayMetrics, Geometry, SurfaceFlags, SurfaceId, SurfaceSpec};
use crate::error::CompositorError;

const CLASS_NAME: &str = "SmartPixelsOverlay";

/// Magenta, keyed out by the layered window
const KEY_COLOR: COLORREF = COLORREF(0x00FF_00FF);
const BLACK: COLORREF = COLORREF(0);

thread_local! {
    // Pattern brush per overlay window, read by WM_PAINT
    static BRUSHES: RefCell<HashMap<isize, HBRUSH>> = RefCell::new(HashMap::new());
}

unsafe extern "system" fn overlay_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_PAINT => {
            paint(hwnd);
            LRESULT(0)
        }
        WM_ERASEBKGND => LRESULT(1),
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn paint(hwnd: HWND) {
    let brush = BRUSHES.with(|b| b.borrow().get(&(hwnd.0 as isize)).copied());
    unsafe {
        let mut ps = PAINTSTRUCT::default();
        let hdc = BeginPaint(hwnd, &mut ps);
        if let Some(brush) = brush {
            // Monochrome brushes draw 0 bits in the text colour, 1 bits in the background colour
            SetTextColor(hdc, BLACK);
            SetBkColor(hdc, KEY_COLOR);
            FillRect(hdc, &ps.rcPaint, brush);
        }
        let _ = EndPaint(hwnd, &ps);
    }
}

/// 1bpp rows, MSB first, each row padded to a 16-bit boundary. Opaque
/// pixels are 0 bits.
pub fn mono_bits(tile: &Pixmap) -> Vec<u8> {
    let width = tile.width() as usize;
    let height = tile.height() as usize;
    let stride = width.div_ceil(16) * 2;
    let mut bits = vec![0u8; stride * height];
    for y in 0..height {
        for x in 0..width {
            let opaque = tile
                .pixel(x as u32, y as u32)
                .is_some_and(|p| p.alpha() == 255);
            if !opaque {
                bits[y * stride + x / 8] |= 0x80 >> (x % 8);
            }
        }
    }
    bits
}

fn pattern_brush(tile: &Pixmap) -> Result<HBRUSH, CompositorError> {
    let bits = mono_bits(tile);
    let bitmap_error = CompositorError::Bitmap {
        width: tile.width(),
        height: tile.height(),
    };
    unsafe {
        let bitmap = CreateBitmap(
            tile.width() as i32,
            tile.height() as i32,
            1,
            1,
            Some(bits.as_ptr() as *const c_void),
        );
        if bitmap.is_invalid() {
            return Err(bitmap_error);
        }
        let brush = CreatePatternBrush(bitmap);
        // The brush keeps its own copy of the bits
        let _ = DeleteObject(bitmap.into());
        if brush.is_invalid() {
            return Err(bitmap_error);
        }
        Ok(brush)
    }
}

fn delete_brush(brush: HBRUSH) {
    unsafe {
        let _ = DeleteObject(brush.into());
    }
}

fn ex_style(flags: SurfaceFlags) -> WINDOW_EX_STYLE {
    let mut style = WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW;
    if !flags.focusable {
        style |= WS_EX_NOACTIVATE;
    }
    if !flags.touchable {
        style |= WS_EX_TRANSPARENT;
    }
    style
}

#[derive(Default)]
pub struct Win32Compositor {
    class_registered: bool,
    next_id: SurfaceId,
    windows: HashMap<SurfaceId, isize>,
}

impl Win32Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    fn register_class(&mut self) -> Result<(), CompositorError> {
        if self.class_registered {
            return Ok(());
        }
        let class_name = wide(CLASS_NAME);
        unsafe {
            let hinstance = GetModuleHandleW(PCWSTR::null())
                .map_err(|e| CompositorError::Backend(e.to_string()))?;
            let wc = WNDCLASSW {
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(overlay_proc),
                hInstance: hinstance.into(),
                lpszClassName: PCWSTR(class_name.as_ptr()),
                ..Default::default()
            };
            if RegisterClassW(&wc) == 0 {
                return Err(CompositorError::Backend(
                    "overlay window class registration failed".into(),
                ));
            }
        }
        self.class_registered = true;
        Ok(())
    }

    fn hwnd(&self, surface: SurfaceId) -> Result<HWND, CompositorError> {
        self.windows
            .get(&surface)
            .map(|&raw| HWND(raw as *mut c_void))
            .ok_or(CompositorError::UnknownSurface(surface))
    }
}

impl Compositor for Win32Compositor {
    fn display_metrics(&self) -> Result<DisplayMetrics, CompositorError> {
        let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
        if width <= 0 || height <= 0 {
            return Err(CompositorError::NoDisplay);
        }
        Ok(DisplayMetrics {
            width: width as u32,
            height: height as u32,
            status_bar_height: 0,
        })
    }

    fn attach(&mut self, spec: &SurfaceSpec, tile: &Pixmap) -> Result<SurfaceId, CompositorError> {
        self.register_class()?;
        let brush = pattern_brush(tile)?;
        let class_name = wide(CLASS_NAME);
        let g = spec.geometry;

        let hwnd = unsafe {
            let hinstance = GetModuleHandleW(PCWSTR::null()).unwrap_or_default();
            CreateWindowExW(
                ex_style(spec.flags),
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WS_POPUP | WS_DISABLED,
                g.x,
                g.y,
                g.width as i32,
                g.height as i32,
                None,
                None,
                Some(hinstance.into()),
                None,
            )
        };
        let hwnd = match hwnd {
            Ok(hwnd) => hwnd,
            Err(e) => {
                delete_brush(brush);
                return Err(CompositorError::AttachRefused(e.to_string()));
            }
        };
        BRUSHES.with(|b| b.borrow_mut().insert(hwnd.0 as isize, brush));

        unsafe {
            let _ = SetLayeredWindowAttributes(hwnd, KEY_COLOR, 255, LWA_COLORKEY);
            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
            let _ = SetWindowPos(
                hwnd,
                Some(HWND_TOPMOST),
                0,
                0,
                0,
                0,
                SWP_NOMOVE | SWP_NOSIZE | SWP_NOACTIVATE | SWP_NOSENDCHANGING,
            );
        }

        self.next_id += 1;
        let id = self.next_id;
        self.windows.insert(id, hwnd.0 as isize);
        tracing::debug!(surface = id, geometry = ?g, "Overlay window created");
        Ok(id)
    }

    fn update_layout(
        &mut self,
        surface: SurfaceId,
        geometry: Geometry,
    ) -> Result<(), CompositorError> {
        let hwnd = self.hwnd(surface)?;
        unsafe {
            SetWindowPos(
                hwnd,
                Some(HWND_TOPMOST),
                geometry.x,
                geometry.y,
                geometry.width as i32,
                geometry.height as i32,
                SWP_NOACTIVATE,
            )
        }
        .map_err(|e| CompositorError::Backend(e.to_string()))
    }

    fn redraw(&mut self, surface: SurfaceId, tile: &Pixmap) -> Result<(), CompositorError> {
        let hwnd = self.hwnd(surface)?;
        let brush = pattern_brush(tile)?;
        if let Some(old) = BRUSHES.with(|b| b.borrow_mut().insert(hwnd.0 as isize, brush)) {
            delete_brush(old);
        }
        unsafe {
            let _ = InvalidateRect(Some(hwnd), None, false);
        }
        Ok(())
    }

    fn detach(&mut self, surface: SurfaceId) {
        let Some(raw) = self.windows.remove(&surface) else {
            return;
        };
        let hwnd = HWND(raw as *mut c_void);
        unsafe {
            let _ = ShowWindow(hwnd, SW_HIDE);
            let _ = DestroyWindow(hwnd);
        }
        if let Some(brush) = BRUSHES.with(|b| b.borrow_mut().remove(&raw)) {
            delete_brush(brush);
        }
        tracing::debug!(surface, "Overlay window destroyed");
    }
}

impl Drop for Win32Compositor {
    fn drop(&mut self) {
        let surfaces: Vec<SurfaceId> = self.windows.keys().copied().collect();
        for surface in surfaces {
            self.detach(surface);
        }
    }
}
