//! Cursor-following IME state indicator.
//!
//! Polls the IME conversion state of whichever foreign window holds keyboard focus and shows
//! it in a small topmost window next to the mouse cursor.
//!
//! High-level flow:
//! 1. Parse CLI, initialize tracing, build the live settings handle.
//! 2. Create the indicator window on the control thread.
//! 3. Install the Ctrl+C handler and (optionally) the stdin console; both only talk to the
//!    control thread through the settings handle or by posting WM_QUIT.
//! 4. Run the scheduler: every tick gates on cursor/foreground visibility, probes the focus
//!    target's IME at most every 100 ms with a 200 ms bounded send, places the indicator,
//!    and trims the working set every 30 s.
//!
//! Foreign windows are only inspected read-only or through timeout-bounded sends, so a hung
//! target can delay a tick by at most the send deadline and never stalls the desktop.
#![cfg_attr(not(windows), allow(dead_code))]

mod classify;
mod cli;
mod console;
mod desktop;
mod error;
mod focus;
mod gate;
mod indicator;
mod logging;
mod monitor;
#[cfg(windows)]
mod overlay;
mod position;
mod probe;
mod reclaim;
mod schedule;
mod settings;
#[cfg(windows)]
mod win32;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cli::Cli;
use logging::configure_logging;
use settings::Settings;

fn main() -> Result<()> {
    let cli = Cli::parse();
    configure_logging(cli.log_level());
    info!(
        version = env!("CARGO_PKG_VERSION"),
        ?cli,
        "starting imetrail"
    );
    let settings = Settings::new(cli.to_settings());
    run(settings, cli.no_console)
}

#[cfg(windows)]
fn run(settings: Settings, no_console: bool) -> Result<()> {
    use std::time::Instant;
    use windows::Win32::System::Threading::GetCurrentThreadId;

    use monitor::Monitor;
    use overlay::Overlay;
    use win32::Win32Desktop;

    let mut indicator = Overlay::create()?;
    let desktop = Win32Desktop;
    let mut monitor = Monitor::new(settings, Instant::now());

    // WM_QUIT must be posted to the control thread; PostQuitMessage from the handler thread
    // would target the wrong queue.
    let control_thread = unsafe { GetCurrentThreadId() };
    ctrlc::set_handler(move || {
        info!("Ctrl+C received, shutting down");
        overlay::request_quit(control_thread);
    })?;
    if !no_console {
        console::spawn(monitor.controls(), move || {
            overlay::request_quit(control_thread)
        })?;
    }

    schedule::run(
        |now| monitor.tick(now, &desktop, &mut indicator),
        overlay::pump,
    );
    Ok(())
}

#[cfg(not(windows))]
fn run(_settings: Settings, _no_console: bool) -> Result<()> {
    anyhow::bail!("imetrail requires the Windows IME and window manager APIs")
}
