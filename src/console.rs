//! Line-oriented stdin collaborator for live edits.
//!
//! Runs on its own thread and only touches the monitor through [`Controls`]; the control
//! thread picks edits up on its next tick.

use std::io::{self, BufRead};
use std::str::FromStr;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::monitor::Controls;
use crate::settings::Rgb;

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Interval(u32),
    Offset(i32, i32),
    Scale(f64),
    Opacity(u32),
    HideCursor(bool),
    TextColor(Rgb),
    BackgroundColor(Rgb),
    Reset,
    Reclaim,
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("{0}: expected {1}")]
    BadArgument(&'static str, &'static str),
}

fn arg<T: FromStr>(
    word: Option<&str>,
    name: &'static str,
    expected: &'static str,
) -> Result<T, CommandError> {
    word.and_then(|w| w.parse().ok())
        .ok_or(CommandError::BadArgument(name, expected))
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let head = words.next().unwrap_or_default().to_ascii_lowercase();
        let cmd = match head.as_str() {
            "interval" => Command::Interval(arg(words.next(), "interval", "milliseconds")?),
            "offset" => Command::Offset(
                arg(words.next(), "offset", "X Y")?,
                arg(words.next(), "offset", "X Y")?,
            ),
            "scale" => Command::Scale(arg(words.next(), "scale", "a factor")?),
            "opacity" => Command::Opacity(arg(words.next(), "opacity", "percent")?),
            "hide-cursor" => Command::HideCursor(match words.next() {
                Some("on") => true,
                Some("off") => false,
                _ => return Err(CommandError::BadArgument("hide-cursor", "on|off")),
            }),
            "text-color" => Command::TextColor(arg(words.next(), "text-color", "#RRGGBB")?),
            "background-color" => {
                Command::BackgroundColor(arg(words.next(), "background-color", "#RRGGBB")?)
            }
            "reset" => Command::Reset,
            "reclaim" => Command::Reclaim,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            _ => return Err(CommandError::Unknown(line.trim().to_string())),
        };
        Ok(cmd)
    }
}

/// Apply `cmd` and describe the resulting settings. `Quit` is left to the caller.
pub fn apply(cmd: &Command, controls: &Controls) -> String {
    let settings = controls.settings();
    match *cmd {
        Command::Interval(ms) => settings.update(|s| s.poll.set_interval_ms(ms)),
        Command::Offset(x, y) => settings.update(|s| s.poll.set_offset(x, y)),
        Command::Scale(f) => settings.update(|s| s.poll.set_scale(f)),
        Command::Opacity(p) => settings.update(|s| s.appearance.set_opacity(p)),
        Command::HideCursor(on) => settings.update(|s| s.poll.set_hide_when_cursor_hidden(on)),
        Command::TextColor(c) => settings.update(|s| s.appearance.text_color = c),
        Command::BackgroundColor(c) => settings.update(|s| s.appearance.background_color = c),
        Command::Reset => controls.reset_to_defaults(),
        Command::Reclaim => {
            controls.force_reclaim();
            return "reclaim requested".to_string();
        }
        Command::Status | Command::Quit => {}
    }
    let s = settings.snapshot();
    let (x, y) = s.poll.offset();
    format!(
        "interval={}ms offset=({x},{y}) scale={} hide-cursor={} opacity={}% text={} background={}",
        s.poll.interval_ms(),
        s.poll.scale(),
        if s.poll.hide_when_cursor_hidden() { "on" } else { "off" },
        s.appearance.opacity(),
        s.appearance.text_color,
        s.appearance.background_color,
    )
}

/// Read commands from `input` until EOF or `quit`, then call `on_quit` (on `quit` only).
pub fn serve<R: BufRead>(input: R, controls: &Controls, on_quit: impl FnOnce()) {
    for line in input.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(?e, "console read failed; closing console");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(Command::Quit) => {
                info!("quit requested from console");
                on_quit();
                return;
            }
            Ok(cmd) => {
                debug!(?cmd, "console command");
                println!("{}", apply(&cmd, controls));
            }
            Err(e) => println!("{e}"),
        }
    }
    debug!("console input closed");
}

/// Serve stdin on a background thread.
pub fn spawn<F>(controls: Controls, on_quit: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name("console".into())
        .spawn(move || serve(io::stdin().lock(), &controls, on_quit))
}
