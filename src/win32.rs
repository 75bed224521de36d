//! Win32 implementation of the OS query surface.
//!
//! Focus is read with `GetGUIThreadInfo`, which inspects the foreign thread's published state
//! without posting to it; `AttachThreadInput` is never called. The only call that
//! crosses into the foreign process is `SendMessageTimeoutW` with `SMTO_ABORTIFHUNG`, which
//! returns by the deadline whether or not the IME window pumps its queue.

use std::time::Duration;

use tracing::trace;
use windows::Win32::Foundation::{ERROR_TIMEOUT, GetLastError, HWND, LPARAM, POINT, WPARAM};
use windows::Win32::System::Memory::{GetProcessHeap, HEAP_FLAGS, HeapCompact};
use windows::Win32::System::Threading::{GetCurrentProcess, SetProcessWorkingSetSize};
use windows::Win32::UI::Input::Ime::ImmGetDefaultIMEWnd;
use windows::Win32::UI::WindowsAndMessaging::{
    CURSOR_SHOWING, CURSORINFO, GUITHREADINFO, GetCursorInfo, GetCursorPos, GetForegroundWindow,
    GetGUIThreadInfo, GetWindowThreadProcessId, SMTO_ABORTIFHUNG, SendMessageTimeoutW,
};

use crate::desktop::{
    Bounded, CursorSource, DpiSource, FocusSource, ImeChannel, ImeRequest, Point, UiThreadId,
    WindowHandle, WorkingSet,
};
use crate::error::{MonitorError, MonitorResult};
use crate::overlay;
use crate::position::DpiScale;

const WM_IME_CONTROL: u32 = 0x0283;

fn hwnd(h: WindowHandle) -> HWND {
    HWND(h.0 as *mut core::ffi::c_void)
}

fn handle(h: HWND) -> Option<WindowHandle> {
    if h.is_invalid() {
        None
    } else {
        Some(WindowHandle(h.0 as isize))
    }
}

/// Stateless; every call queries the live desktop.
pub struct Win32Desktop;

impl CursorSource for Win32Desktop {
    fn cursor_visible(&self) -> bool {
        let mut info = CURSORINFO {
            cbSize: std::mem::size_of::<CURSORINFO>() as u32,
            ..Default::default()
        };
        unsafe { GetCursorInfo(&mut info).is_ok() && info.flags.0 & CURSOR_SHOWING.0 != 0 }
    }

    fn cursor_position(&self) -> Option<Point> {
        let mut pt = POINT::default();
        unsafe { GetCursorPos(&mut pt).ok()? };
        Some(Point { x: pt.x, y: pt.y })
    }
}

impl FocusSource for Win32Desktop {
    fn foreground_window(&self) -> Option<WindowHandle> {
        handle(unsafe { GetForegroundWindow() })
    }

    fn window_thread(&self, window: WindowHandle) -> Option<UiThreadId> {
        match unsafe { GetWindowThreadProcessId(hwnd(window), None) } {
            0 => None,
            tid => Some(UiThreadId(tid)),
        }
    }

    fn thread_focus(&self, thread: UiThreadId) -> Option<WindowHandle> {
        let mut gui = GUITHREADINFO {
            cbSize: std::mem::size_of::<GUITHREADINFO>() as u32,
            ..Default::default()
        };
        unsafe { GetGUIThreadInfo(thread.0, &mut gui).ok()? };
        handle(gui.hwndFocus)
    }
}

impl ImeChannel for Win32Desktop {
    fn default_ime_window(&self, window: WindowHandle) -> Option<WindowHandle> {
        handle(unsafe { ImmGetDefaultIMEWnd(hwnd(window)) })
    }

    fn send_bounded(
        &self,
        ime_window: WindowHandle,
        request: ImeRequest,
        timeout: Duration,
    ) -> Bounded<isize> {
        let mut answer: usize = 0;
        let millis = timeout.as_millis().min(u32::MAX as u128) as u32;
        let delivered = unsafe {
            SendMessageTimeoutW(
                hwnd(ime_window),
                WM_IME_CONTROL,
                WPARAM(request.command()),
                LPARAM(0),
                SMTO_ABORTIFHUNG,
                millis,
                Some(&raw mut answer),
            )
        };
        if delivered.0 != 0 {
            return Bounded::Ok(answer as isize);
        }
        let err = unsafe { GetLastError() };
        trace!(?request, code = err.0, "SendMessageTimeoutW gave no answer");
        if err == ERROR_TIMEOUT {
            Bounded::TimedOut
        } else {
            Bounded::Failed
        }
    }
}

impl WorkingSet for Win32Desktop {
    fn compact_and_trim(&self) -> MonitorResult<()> {
        unsafe {
            if let Ok(heap) = GetProcessHeap() {
                let _ = HeapCompact(heap, HEAP_FLAGS(0));
            }
            // (SIZE_T)-1 for both bounds asks the OS to trim as much as possible.
            SetProcessWorkingSetSize(GetCurrentProcess(), usize::MAX, usize::MAX)
                .map_err(|e| MonitorError::ReclaimFailure(e.to_string()))
        }
    }
}

impl DpiSource for Win32Desktop {
    fn take_dpi_change(&self) -> Option<DpiScale> {
        overlay::take_dpi_change()
    }
}
