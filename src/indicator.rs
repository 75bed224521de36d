//! Observable indicator state and the renderer seam.
//!
//! The monitor is the only writer. Visibility and text are forwarded to the renderer only
//! when they change; position is forwarded on every visible tick.

use crate::classify::DisplayState;
use crate::desktop::Point;
use crate::settings::SettingsSnapshot;

/// Renderer of the indicator (the overlay window on Windows).
pub trait IndicatorSurface {
    fn set_visible(&mut self, visible: bool);
    fn set_text(&mut self, glyph: &str);
    /// Logical screen position of the indicator's top-left corner.
    fn set_position(&mut self, at: Point);
    /// Latest appearance and scale; called every tick, implementations diff themselves.
    fn configure(&mut self, settings: &SettingsSnapshot);
}

/// `(visible, glyph, x, y)` as last pushed to the renderer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndicatorState {
    pub visible: bool,
    pub glyph: &'static str,
    pub position: Point,
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self {
            visible: false,
            glyph: DisplayState::default().glyph(),
            position: Point::default(),
        }
    }
}

#[derive(Default)]
pub struct Indicator {
    state: IndicatorState,
}

impl Indicator {
    pub fn state(&self) -> &IndicatorState {
        &self.state
    }

    /// Returns true if the indicator was visible before.
    pub fn hide<S: IndicatorSurface + ?Sized>(&mut self, surface: &mut S) -> bool {
        if !self.state.visible {
            return false;
        }
        self.state.visible = false;
        surface.set_visible(false);
        true
    }

    pub fn show<S: IndicatorSurface + ?Sized>(&mut self, surface: &mut S) -> bool {
        if self.state.visible {
            return false;
        }
        self.state.visible = true;
        surface.set_visible(true);
        true
    }

    /// Rewrite the text only when `glyph` differs from what is displayed.
    pub fn set_glyph<S: IndicatorSurface + ?Sized>(
        &mut self,
        glyph: &'static str,
        surface: &mut S,
    ) -> bool {
        if self.state.glyph == glyph {
            return false;
        }
        self.state.glyph = glyph;
        surface.set_text(glyph);
        true
    }

    pub fn move_to<S: IndicatorSurface + ?Sized>(&mut self, at: Point, surface: &mut S) {
        self.state.position = at;
        surface.set_position(at);
    }
}
