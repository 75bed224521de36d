//! Cursor -> indicator placement and indicator geometry.
//!
//! The cursor position arrives in physical pixels and is divided by the per-axis DPI scale
//! cached from the last DPI-change notification, then shifted by the configured offset plus
//! a fixed margin. No smoothing: at low poll rates the indicator jumps, which is accepted.

use tracing::debug;

use crate::desktop::Point;

/// Fixed gap between cursor and indicator on each axis, in logical pixels.
pub const CURSOR_MARGIN: i32 = 5;
/// DPI at which one logical pixel equals one physical pixel.
pub const BASE_DPI: u32 = 96;
/// Indicator edge length in logical pixels at scale 1.0.
pub const INDICATOR_SIZE: f64 = 24.0;
/// Glyph height as a share of the indicator edge.
const GLYPH_RATIO: f64 = 0.7;

/// Per-axis physical-to-logical ratio.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DpiScale {
    pub x: f64,
    pub y: f64,
}

impl Default for DpiScale {
    fn default() -> Self {
        Self { x: 1.0, y: 1.0 }
    }
}

impl DpiScale {
    /// Build from raw DPI values (as carried by WM_DPICHANGED). Zero is treated as 96.
    pub fn from_dpi(dpi_x: u32, dpi_y: u32) -> Self {
        let axis = |dpi: u32| {
            if dpi == 0 {
                1.0
            } else {
                dpi as f64 / BASE_DPI as f64
            }
        };
        Self {
            x: axis(dpi_x),
            y: axis(dpi_y),
        }
    }
}

/// Logical indicator origin for a physical cursor position. Saturates at the `i32` bounds.
pub fn indicator_origin(cursor: Point, dpi: DpiScale, offset: (i32, i32)) -> Point {
    let axis = |physical: i32, scale: f64, offset: i32| {
        ((physical as f64 / scale).round() as i32)
            .saturating_add(offset)
            .saturating_add(CURSOR_MARGIN)
    };
    Point {
        x: axis(cursor.x, dpi.x, offset.0),
        y: axis(cursor.y, dpi.y, offset.1),
    }
}

/// Physical edge lengths of the indicator box for `scale` at `dpi`.
pub fn indicator_extent(scale: f64, dpi: DpiScale) -> (i32, i32) {
    (
        (INDICATOR_SIZE * scale * dpi.x).round() as i32,
        (INDICATOR_SIZE * scale * dpi.y).round() as i32,
    )
}

/// Physical glyph cell height for `scale` at `dpi`; follows the box, never below 1.
pub fn glyph_height(scale: f64, dpi: DpiScale) -> i32 {
    ((INDICATOR_SIZE * GLYPH_RATIO * scale * dpi.y).round() as i32).max(1)
}

/// Holds the cached DPI scale between notifications.
#[derive(Default)]
pub struct PositionTracker {
    dpi: DpiScale,
}

impl PositionTracker {
    pub fn on_dpi_changed(&mut self, dpi: DpiScale) {
        if dpi != self.dpi {
            debug!(x = dpi.x, y = dpi.y, "DPI scale changed");
            self.dpi = dpi;
        }
    }

    pub fn locate(&self, cursor: Point, offset: (i32, i32)) -> Point {
        indicator_origin(cursor, self.dpi, offset)
    }
}
