//! Live configuration shared with the settings collaborator.
//!
//! Values may be rewritten between any two ticks, so every setter clamps on assignment
//! rather than trusting a one-time validation at load. The monitor reads a snapshot at the
//! start of each tick.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use thiserror::Error;

pub const INTERVAL_MIN_MS: u32 = 2;
pub const INTERVAL_MAX_MS: u32 = 100;
pub const DEFAULT_INTERVAL_MS: u32 = 10;
pub const SCALE_MIN: f64 = 0.5;
pub const SCALE_MAX: f64 = 2.0;
pub const OPACITY_MAX: u8 = 100;

pub fn clamp_interval_ms(ms: u32) -> u32 {
    ms.clamp(INTERVAL_MIN_MS, INTERVAL_MAX_MS)
}

pub fn clamp_scale(scale: f64) -> f64 {
    if scale.is_nan() {
        return 1.0;
    }
    scale.clamp(SCALE_MIN, SCALE_MAX)
}

/// Polling and placement parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PollConfig {
    interval_ms: u32,
    offset_x: i32,
    offset_y: i32,
    hide_when_cursor_hidden: bool,
    scale: f64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            offset_x: 10,
            offset_y: 10,
            hide_when_cursor_hidden: true,
            scale: 1.0,
        }
    }
}

impl PollConfig {
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn set_interval_ms(&mut self, ms: u32) {
        self.interval_ms = clamp_interval_ms(ms);
    }

    pub fn offset(&self) -> (i32, i32) {
        (self.offset_x, self.offset_y)
    }

    pub fn set_offset(&mut self, x: i32, y: i32) {
        self.offset_x = x;
        self.offset_y = y;
    }

    pub fn hide_when_cursor_hidden(&self) -> bool {
        self.hide_when_cursor_hidden
    }

    pub fn set_hide_when_cursor_hidden(&mut self, hide: bool) {
        self.hide_when_cursor_hidden = hide;
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = clamp_scale(scale);
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {0:?}, expected #RRGGBB")]
pub struct ColorParseError(String);

/// 24-bit color.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Win32 COLORREF layout (0x00BBGGRR).
    pub fn colorref(self) -> u32 {
        (self.0 as u32) | ((self.1 as u32) << 8) | ((self.2 as u32) << 16)
    }
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        match (channel(0), channel(2), channel(4)) {
            (Ok(r), Ok(g), Ok(b)) => Ok(Rgb(r, g, b)),
            _ => Err(ColorParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Rendering parameters passed through to the indicator window.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Appearance {
    opacity: u8,
    pub text_color: Rgb,
    pub background_color: Rgb,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            opacity: 80,
            text_color: Rgb(0xFF, 0xFF, 0xFF),
            background_color: Rgb(0x2B, 0x2B, 0x2B),
        }
    }
}

impl Appearance {
    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    pub fn set_opacity(&mut self, percent: u32) {
        self.opacity = percent.min(OPACITY_MAX as u32) as u8;
    }

    /// Opacity as a layered-window alpha byte.
    pub fn alpha(&self) -> u8 {
        ((self.opacity as u32 * 255 + 50) / 100) as u8
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SettingsSnapshot {
    pub poll: PollConfig,
    pub appearance: Appearance,
}

/// Shared, cloneable handle to the live settings.
#[derive(Clone, Default)]
pub struct Settings {
    inner: Arc<Mutex<SettingsSnapshot>>,
}

impl Settings {
    pub fn new(initial: SettingsSnapshot) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Copy of the current values. A poisoned lock yields the defaults.
    pub fn snapshot(&self) -> SettingsSnapshot {
        self.inner.lock().map(|g| *g).unwrap_or_default()
    }

    /// Apply an edit; the setters clamp whatever `edit` assigns.
    pub fn update<F: FnOnce(&mut SettingsSnapshot)>(&self, edit: F) {
        if let Ok(mut guard) = self.inner.lock() {
            edit(&mut guard);
        }
    }

    pub fn reset_to_defaults(&self) {
        self.update(|s| *s = SettingsSnapshot::default());
    }
}
