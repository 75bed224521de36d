//! Topmost indicator window and the control thread's message pump.
//!
//! The window is layered (for opacity), click-through, never activated and absent from the
//! taskbar. It only renders: the glyph is kept as the window text and painted on WM_PAINT,
//! colors come from the latest settings snapshot. WM_DPICHANGED is recorded here and handed
//! to the monitor through `take_dpi_change`.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use tracing::{debug, info};
use widestring::U16CString;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateFontIndirectW, CreateSolidBrush, DEFAULT_GUI_FONT, DT_CENTER,
    DT_SINGLELINE, DT_VCENTER, DeleteObject, DrawTextW, EndPaint, FW_SEMIBOLD, FillRect,
    GetStockObject, HGDIOBJ, InvalidateRect, LOGFONTW, PAINTSTRUCT, SelectObject, SetBkMode,
    SetTextColor, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::HiDpi::GetDpiForWindow;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
    GetWindowTextW, HTTRANSPARENT, HWND_TOPMOST, LWA_ALPHA, MSG, MsgWaitForMultipleObjects,
    PM_REMOVE, PeekMessageW, PostThreadMessageW, QS_ALLINPUT, RegisterClassW, SW_HIDE,
    SW_SHOWNOACTIVATE, SWP_NOACTIVATE, SetLayeredWindowAttributes, SetWindowPos, SetWindowTextW,
    ShowWindow, TranslateMessage, WM_DPICHANGED, WM_ERASEBKGND, WM_NCHITTEST,
    WM_PAINT, WM_QUIT, WNDCLASSW, WS_EX_LAYERED, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW,
    WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
};
use windows::core::PCWSTR;

use crate::desktop::Point;
use crate::indicator::IndicatorSurface;
use crate::position::{BASE_DPI, DpiScale, INDICATOR_SIZE, glyph_height, indicator_extent};
use crate::settings::{Appearance, SettingsSnapshot};

/// Face with both kana and full-width Latin coverage.
const GLYPH_FACE: &str = "Yu Gothic UI";

static OVERLAY_CLASS: OnceCell<U16CString> = OnceCell::new();
static DPI_X: AtomicU32 = AtomicU32::new(BASE_DPI);
static DPI_Y: AtomicU32 = AtomicU32::new(BASE_DPI);
static DPI_PENDING: AtomicBool = AtomicBool::new(false);
static TEXT_COLOR: AtomicU32 = AtomicU32::new(0x00FF_FFFF);
static BACKGROUND_COLOR: AtomicU32 = AtomicU32::new(0x002B_2B2B);
static QUIT_REQUESTED: AtomicBool = AtomicBool::new(false);
/// HFONT used by WM_PAINT; 0 selects the stock GUI font.
static GLYPH_FONT: AtomicIsize = AtomicIsize::new(0);

fn record_dpi(x: u32, y: u32) {
    DPI_X.store(x, Ordering::Relaxed);
    DPI_Y.store(y, Ordering::Relaxed);
    DPI_PENDING.store(true, Ordering::Release);
}

/// Most recent DPI-change notification, if one arrived since the last call.
pub fn take_dpi_change() -> Option<DpiScale> {
    if DPI_PENDING.swap(false, Ordering::Acquire) {
        Some(current_dpi())
    } else {
        None
    }
}

fn current_dpi() -> DpiScale {
    DpiScale::from_dpi(DPI_X.load(Ordering::Relaxed), DPI_Y.load(Ordering::Relaxed))
}

/// Ask the control thread to leave its pump. Safe to call from any thread.
pub fn request_quit(control_thread: u32) {
    QUIT_REQUESTED.store(true, Ordering::Relaxed);
    unsafe {
        let _ = PostThreadMessageW(control_thread, WM_QUIT, WPARAM(0), LPARAM(0));
    }
}

unsafe extern "system" fn overlay_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_ERASEBKGND => LRESULT(1),
        WM_NCHITTEST => LRESULT(HTTRANSPARENT as isize),
        WM_DPICHANGED => {
            // LOWORD = x DPI, HIWORD = y DPI.
            let x = (wparam.0 & 0xFFFF) as u32;
            let y = ((wparam.0 >> 16) & 0xFFFF) as u32;
            record_dpi(x, y);
            LRESULT(0)
        }
        WM_PAINT => unsafe {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);
            let mut rc = RECT::default();
            let _ = GetClientRect(hwnd, &mut rc);
            let brush = CreateSolidBrush(COLORREF(BACKGROUND_COLOR.load(Ordering::Relaxed)));
            FillRect(hdc, &rc, brush);
            let _ = DeleteObject(HGDIOBJ(brush.0));

            let mut text = [0u16; 8];
            let len = GetWindowTextW(hwnd, &mut text) as usize;
            let font = match GLYPH_FONT.load(Ordering::Relaxed) {
                0 => GetStockObject(DEFAULT_GUI_FONT),
                raw => HGDIOBJ(raw as *mut core::ffi::c_void),
            };
            let old_font = SelectObject(hdc, font);
            SetBkMode(hdc, TRANSPARENT);
            SetTextColor(hdc, COLORREF(TEXT_COLOR.load(Ordering::Relaxed)));
            DrawTextW(
                hdc,
                &mut text[..len.min(text.len())],
                &mut rc,
                DT_CENTER | DT_VCENTER | DT_SINGLELINE,
            );
            SelectObject(hdc, old_font);
            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        },
        _ => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

fn register_overlay_class() -> Result<&'static U16CString> {
    OVERLAY_CLASS.get_or_try_init(|| {
        let name = U16CString::from_str("ImeTrailIndicator")?;
        unsafe {
            let wc = WNDCLASSW {
                lpfnWndProc: Some(overlay_wnd_proc),
                hInstance: GetModuleHandleW(None)?.into(),
                lpszClassName: PCWSTR(name.as_ptr()),
                ..Default::default()
            };
            if RegisterClassW(&wc) == 0 {
                return Err(anyhow!("RegisterClassW failed"));
            }
        }
        Ok(name)
    })
}

/// Indicator window. Destroyed on drop.
pub struct Overlay {
    hwnd: HWND,
    scale: f64,
    appearance: Option<Appearance>,
    font_height: Option<i32>,
}

impl Overlay {
    pub fn create() -> Result<Self> {
        let class = register_overlay_class()?;
        let title = U16CString::from_str(crate::classify::DisplayState::default().glyph())?;
        let ex_style =
            WS_EX_LAYERED | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE | WS_EX_TRANSPARENT;
        let hwnd = unsafe {
            CreateWindowExW(
                ex_style,
                PCWSTR(class.as_ptr()),
                PCWSTR(title.as_ptr()),
                WS_POPUP,
                0,
                0,
                INDICATOR_SIZE as i32,
                INDICATOR_SIZE as i32,
                None,
                None,
                None,
                None,
            )?
        };
        let dpi = unsafe { GetDpiForWindow(hwnd) };
        if dpi != 0 {
            record_dpi(dpi, dpi);
        }
        info!(dpi, "indicator window created");
        let mut overlay = Self {
            hwnd,
            scale: 1.0,
            appearance: None,
            font_height: None,
        };
        overlay.refresh_font(current_dpi());
        Ok(overlay)
    }

    /// Rebuild the glyph font when scale or DPI changed its cell height.
    fn refresh_font(&mut self, dpi: DpiScale) {
        let height = glyph_height(self.scale, dpi);
        if self.font_height == Some(height) {
            return;
        }
        let mut lf = LOGFONTW {
            // Negative: match the character height, not the cell.
            lfHeight: -height,
            lfWeight: FW_SEMIBOLD.0 as i32,
            ..Default::default()
        };
        for (dst, src) in lf.lfFaceName.iter_mut().zip(GLYPH_FACE.encode_utf16()) {
            *dst = src;
        }
        let font = unsafe { CreateFontIndirectW(&lf) };
        if font.is_invalid() {
            debug!(height, "glyph font creation failed; keeping previous font");
            return;
        }
        let previous = GLYPH_FONT.swap(font.0 as isize, Ordering::Relaxed);
        unsafe {
            if previous != 0 {
                let _ = DeleteObject(HGDIOBJ(previous as *mut core::ffi::c_void));
            }
            let _ = InvalidateRect(Some(self.hwnd), None, true);
        }
        debug!(height, "glyph font sized");
        self.font_height = Some(height);
    }
}

impl IndicatorSurface for Overlay {
    fn set_visible(&mut self, visible: bool) {
        unsafe {
            let _ = ShowWindow(self.hwnd, if visible { SW_SHOWNOACTIVATE } else { SW_HIDE });
        }
    }

    fn set_text(&mut self, glyph: &str) {
        if let Ok(text) = U16CString::from_str(glyph) {
            unsafe {
                let _ = SetWindowTextW(self.hwnd, PCWSTR(text.as_ptr()));
                let _ = InvalidateRect(Some(self.hwnd), None, true);
            }
        }
    }

    fn set_position(&mut self, at: Point) {
        // Logical -> physical with the same DPI the tracker divided by.
        let dpi = current_dpi();
        self.refresh_font(dpi);
        let (w, h) = indicator_extent(self.scale, dpi);
        let x = (at.x as f64 * dpi.x).round() as i32;
        let y = (at.y as f64 * dpi.y).round() as i32;
        unsafe {
            let _ = SetWindowPos(self.hwnd, Some(HWND_TOPMOST), x, y, w, h, SWP_NOACTIVATE);
        }
    }

    fn configure(&mut self, settings: &SettingsSnapshot) {
        self.scale = settings.poll.scale();
        self.refresh_font(current_dpi());
        if self.appearance == Some(settings.appearance) {
            return;
        }
        let a = settings.appearance;
        TEXT_COLOR.store(a.text_color.colorref(), Ordering::Relaxed);
        BACKGROUND_COLOR.store(a.background_color.colorref(), Ordering::Relaxed);
        unsafe {
            let _ = SetLayeredWindowAttributes(self.hwnd, COLORREF(0), a.alpha(), LWA_ALPHA);
            let _ = InvalidateRect(Some(self.hwnd), None, true);
        }
        debug!(
            opacity = a.opacity(),
            text = %a.text_color,
            background = %a.background_color,
            "indicator appearance applied"
        );
        self.appearance = Some(a);
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyWindow(self.hwnd);
            let font = GLYPH_FONT.swap(0, Ordering::Relaxed);
            if font != 0 {
                let _ = DeleteObject(HGDIOBJ(font as *mut core::ffi::c_void));
            }
        }
    }
}

/// Dispatch window messages until `wait` has elapsed, then report whether the scheduler
/// should keep going. Returns early only to stop.
pub fn pump(wait: Duration) -> ControlFlow<()> {
    let deadline = Instant::now() + wait;
    let mut msg = MSG::default();
    loop {
        unsafe {
            while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                if msg.message == WM_QUIT {
                    return ControlFlow::Break(());
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
        if QUIT_REQUESTED.load(Ordering::Relaxed) {
            return ControlFlow::Break(());
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return ControlFlow::Continue(());
        }
        let millis = remaining.as_millis().clamp(1, u32::MAX as u128) as u32;
        unsafe {
            let _ = MsgWaitForMultipleObjects(None, false, millis, QS_ALLINPUT);
        }
    }
}
