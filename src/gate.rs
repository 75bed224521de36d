//! Per-tick decision whether the indicator is evaluated at all.

use crate::desktop::{CursorSource, FocusSource};
use crate::settings::PollConfig;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HideReason {
    CursorHidden,
    NoForeground,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Gate {
    Visible,
    Hidden(HideReason),
}

/// Hidden when the user asked to follow cursor visibility and the cursor is hidden, or when
/// there is no foreground window. Otherwise the rest of the pipeline runs.
pub fn evaluate<D>(config: &PollConfig, desktop: &D) -> Gate
where
    D: CursorSource + FocusSource + ?Sized,
{
    if config.hide_when_cursor_hidden() && !desktop.cursor_visible() {
        return Gate::Hidden(HideReason::CursorHidden);
    }
    if desktop.foreground_window().is_none() {
        return Gate::Hidden(HideReason::NoForeground);
    }
    Gate::Visible
}
