//! Resolution of the window that actually holds keyboard focus.
//!
//! The foreground window is usually a top-level frame; the caret lives in one of its
//! children owned by the same UI thread. The focus window is read from that thread's
//! published GUI state. Nothing is sent to the foreign thread and its input queue is never
//! attached to ours, so a hung target cannot stall this lookup.

use tracing::trace;

use crate::desktop::{FocusSource, WindowHandle};
use crate::error::{MonitorError, MonitorResult};

/// Windows resolved for the current tick. Discarded when the tick ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FocusTarget {
    pub foreground: WindowHandle,
    pub focus: WindowHandle,
}

/// Resolve the focus target of the current foreground window, falling back to the
/// foreground window itself when its thread publishes no focus.
pub fn resolve_focus<F: FocusSource + ?Sized>(source: &F) -> MonitorResult<FocusTarget> {
    let foreground = source
        .foreground_window()
        .ok_or(MonitorError::ForegroundUnavailable)?;
    let focus = source
        .window_thread(foreground)
        .and_then(|thread| source.thread_focus(thread))
        .unwrap_or(foreground);
    trace!(foreground = foreground.0, focus = focus.0, "focus resolved");
    Ok(FocusTarget { foreground, focus })
}
