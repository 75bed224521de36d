//! Command line interface and its conversion into live settings.
//!
//! Numeric options are not range-checked by clap: out-of-range values are accepted and
//! clamped by the settings setters, the same path live edits take.

use clap::{ArgAction, Parser};

use crate::settings::{Rgb, SettingsSnapshot};

/// Verbosity selected on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = concat!(
        env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"),
        " - Show the IME conversion state of the focused window next to the mouse cursor.",
    )
)]
pub struct Cli {
    /// Poll period in milliseconds (clamped to 2..=100).
    #[arg(long = "interval", default_value_t = 10)]
    pub interval_ms: u32,
    /// Horizontal distance from the cursor in logical pixels.
    #[arg(long = "offset-x", default_value_t = 10, allow_negative_numbers = true)]
    pub offset_x: i32,
    /// Vertical distance from the cursor in logical pixels.
    #[arg(long = "offset-y", default_value_t = 10, allow_negative_numbers = true)]
    pub offset_y: i32,
    /// Indicator size factor (clamped to 0.5..=2.0).
    #[arg(long = "scale", default_value_t = 1.0)]
    pub scale: f64,
    /// Keep showing the indicator while the mouse cursor is hidden (e.g. while typing).
    #[arg(long = "show-when-cursor-hidden")]
    pub show_when_cursor_hidden: bool,
    /// Indicator opacity in percent (clamped to 0..=100).
    #[arg(long = "opacity", default_value_t = 80)]
    pub opacity: u32,
    /// Glyph color as #RRGGBB.
    #[arg(long = "text-color", default_value = "#FFFFFF")]
    pub text_color: Rgb,
    /// Indicator background as #RRGGBB.
    #[arg(long = "background-color", default_value = "#2B2B2B")]
    pub background_color: Rgb,
    /// Do not read live edit commands from stdin.
    #[arg(long = "no-console")]
    pub no_console: bool,
    /// Increase verbosity (-v=debug, -vv=trace). Overrides RUST_LOG.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
    /// Quiet mode: only warnings and errors. Overrides -v and RUST_LOG.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

impl Cli {
    pub fn log_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Warn
        } else if self.verbose > 1 {
            LogLevel::Trace
        } else if self.verbose == 1 {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }

    /// Initial settings; everything passes through the clamping setters.
    pub fn to_settings(&self) -> SettingsSnapshot {
        let mut s = SettingsSnapshot::default();
        s.poll.set_interval_ms(self.interval_ms);
        s.poll.set_offset(self.offset_x, self.offset_y);
        s.poll.set_scale(self.scale);
        s.poll.set_hide_when_cursor_hidden(!self.show_when_cursor_hidden);
        s.appearance.set_opacity(self.opacity);
        s.appearance.text_color = self.text_color;
        s.appearance.background_color = self.background_color;
        s
    }
}
