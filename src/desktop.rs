//! OS query surface consumed by the probing core.
//!
//! The core never talks to the windowing system directly; every query goes through one of
//! the small traits below. The Windows implementation lives in `win32`, tests use fakes.
//! Handles are opaque values owned by other processes and are never kept beyond the tick
//! that resolved them.

use std::time::Duration;

use crate::error::MonitorResult;
use crate::position::DpiScale;

/// Opaque foreign window reference (an HWND value on Windows).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Identifier of the UI thread that owns a window.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct UiThreadId(pub u32);

/// Screen point in physical pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Outcome of a bounded-timeout cross-process send.
///
/// `TimedOut` and `Failed` are kept apart from `Ok(0)` so callers have to decide what an
/// unanswered query means instead of reading it as "closed".
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bounded<T> {
    Ok(T),
    TimedOut,
    Failed,
}

/// Queries understood by the default IME window (`WM_IME_CONTROL` sub-commands).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImeRequest {
    OpenStatus,
    ConversionMode,
}

impl ImeRequest {
    /// `IMC_*` command value carried in WPARAM.
    pub fn command(self) -> usize {
        match self {
            ImeRequest::OpenStatus => 0x0005,     // IMC_GETOPENSTATUS
            ImeRequest::ConversionMode => 0x0001, // IMC_GETCONVERSIONMODE
        }
    }
}

pub trait CursorSource {
    /// Whether the system cursor is currently shown.
    fn cursor_visible(&self) -> bool;
    /// Cursor position in physical pixels.
    fn cursor_position(&self) -> Option<Point>;
}

pub trait FocusSource {
    fn foreground_window(&self) -> Option<WindowHandle>;
    fn window_thread(&self, window: WindowHandle) -> Option<UiThreadId>;
    /// Read-only lookup of the focus window published by `thread`. Must not post or send
    /// anything to that thread and must not pair input queues with it.
    fn thread_focus(&self, thread: UiThreadId) -> Option<WindowHandle>;
}

pub trait ImeChannel {
    /// Local lookup of the default IME window for `window`; cannot hang.
    fn default_ime_window(&self, window: WindowHandle) -> Option<WindowHandle>;
    /// Deliver `request` to `ime_window`, returning within `timeout` whether or not the
    /// receiver ever processes it.
    fn send_bounded(
        &self,
        ime_window: WindowHandle,
        request: ImeRequest,
        timeout: Duration,
    ) -> Bounded<isize>;
}

pub trait WorkingSet {
    /// Compact the process heap and ask the OS to trim the resident working set.
    fn compact_and_trim(&self) -> MonitorResult<()>;
}

pub trait DpiSource {
    /// DPI scale from the most recent DPI-change notification, consumed once.
    fn take_dpi_change(&self) -> Option<DpiScale>;
}

/// Everything the monitor needs from the host OS.
pub trait Desktop: CursorSource + FocusSource + ImeChannel + WorkingSet + DpiSource {}

impl<T> Desktop for T where T: CursorSource + FocusSource + ImeChannel + WorkingSet + DpiSource {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ime_request_commands_match_imc_values() {
        assert_eq!(ImeRequest::OpenStatus.command(), 5);
        assert_eq!(ImeRequest::ConversionMode.command(), 1);
    }
}
