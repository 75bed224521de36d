//! One tick of the probing pipeline and the control surface around it.
//!
//! Per tick: visibility gate, then (when due) focus resolution + IME probe + classification,
//! then cursor tracking. The reclaimer runs on its own due time regardless of the gate.
//! Faults are contained here: an error or panic inside a tick hides the indicator for that
//! tick and the caller keeps scheduling.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::classify::classify;
use crate::desktop::Desktop;
use crate::error::{MonitorError, MonitorResult};
use crate::focus::resolve_focus;
use crate::gate::{self, Gate};
use crate::indicator::{Indicator, IndicatorState, IndicatorSurface};
use crate::position::PositionTracker;
use crate::probe::{ImeProber, PROBE_PERIOD};
use crate::reclaim::Reclaimer;
use crate::schedule::Periodic;
use crate::settings::{Settings, SettingsSnapshot};

/// Handle given to collaborators (settings UI, console, tray) to steer the monitor.
#[derive(Clone)]
pub struct Controls {
    settings: Settings,
    reclaim_requested: Arc<AtomicBool>,
}

impl Controls {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn reset_to_defaults(&self) {
        self.settings.reset_to_defaults();
    }

    /// Run the reclaimer on the next tick regardless of its due time.
    pub fn force_reclaim(&self) {
        self.reclaim_requested.store(true, Ordering::Relaxed);
    }
}

pub struct Monitor {
    controls: Controls,
    prober: ImeProber,
    probe_due: Periodic,
    reclaimer: Reclaimer,
    tracker: PositionTracker,
    indicator: Indicator,
}

impl Monitor {
    pub fn new(settings: Settings, start: Instant) -> Self {
        Self {
            controls: Controls {
                settings,
                reclaim_requested: Arc::new(AtomicBool::new(false)),
            },
            prober: ImeProber::default(),
            probe_due: Periodic::immediate(PROBE_PERIOD),
            reclaimer: Reclaimer::new(start),
            tracker: PositionTracker::default(),
            indicator: Indicator::default(),
        }
    }

    pub fn controls(&self) -> Controls {
        self.controls.clone()
    }

    pub fn indicator(&self) -> &IndicatorState {
        self.indicator.state()
    }

    /// Run one tick at `now` and return the period to arm for the next one.
    pub fn tick<D, S>(&mut self, now: Instant, desktop: &D, surface: &mut S) -> Duration
    where
        D: Desktop + ?Sized,
        S: IndicatorSurface + ?Sized,
    {
        let snapshot = self.controls.settings.snapshot();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_pipeline(now, &snapshot, desktop, surface)
        }))
        .unwrap_or_else(|payload| Err(MonitorError::TickAborted(panic_message(&*payload))));
        if let Err(e) = outcome {
            match e {
                MonitorError::TickAborted(_) => warn!(%e, "tick fault contained"),
                _ => debug!(%e, "tick degraded"),
            }
            self.indicator.hide(surface);
        }

        let forced = self.controls.reclaim_requested.swap(false, Ordering::Relaxed);
        let reclaimed = panic::catch_unwind(AssertUnwindSafe(|| {
            self.reclaimer.poll(now, forced, desktop)
        }));
        if reclaimed.is_err() {
            warn!("reclaim pass panicked; ignored");
        }

        Duration::from_millis(snapshot.poll.interval_ms() as u64)
    }

    fn run_pipeline<D, S>(
        &mut self,
        now: Instant,
        snapshot: &SettingsSnapshot,
        desktop: &D,
        surface: &mut S,
    ) -> MonitorResult<()>
    where
        D: Desktop + ?Sized,
        S: IndicatorSurface + ?Sized,
    {
        if let Some(dpi) = desktop.take_dpi_change() {
            self.tracker.on_dpi_changed(dpi);
        }
        surface.configure(snapshot);

        if let Gate::Hidden(reason) = gate::evaluate(&snapshot.poll, desktop) {
            if self.indicator.hide(surface) {
                debug!(?reason, "indicator hidden");
            }
            return Ok(());
        }

        if self.probe_due.poll(now) {
            let target = resolve_focus(desktop)?;
            let probe = self.prober.probe(desktop, target.focus);
            let state = classify(&probe);
            if self.indicator.set_glyph(state.glyph(), surface) {
                debug!(
                    ?state,
                    foreground = target.foreground.0,
                    focus = target.focus.0,
                    retrieved = probe.retrieved,
                    "IME display state changed"
                );
            }
        }

        if let Some(cursor) = desktop.cursor_position() {
            let at = self.tracker.locate(cursor, snapshot.poll.offset());
            self.indicator.move_to(at, surface);
        }
        self.indicator.show(surface);
        Ok(())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ConversionMode;
    use crate::desktop::{
        Bounded, CursorSource, DpiSource, FocusSource, ImeChannel, ImeRequest, Point, UiThreadId,
        WindowHandle, WorkingSet,
    };
    use crate::indicator::tests::Recorder;
    use crate::position::DpiScale;
    use std::cell::Cell;

    struct FakeDesktop {
        cursor_visible: Cell<bool>,
        cursor: Cell<Option<Point>>,
        foreground: Cell<Option<WindowHandle>>,
        open: Cell<bool>,
        mode: Cell<u32>,
        sends: Cell<u32>,
        trims: Cell<u32>,
        dpi: Cell<Option<DpiScale>>,
        panic_on_foreground: Cell<bool>,
    }

    impl Default for FakeDesktop {
        fn default() -> Self {
            Self {
                cursor_visible: Cell::new(true),
                cursor: Cell::new(Some(Point { x: 100, y: 100 })),
                foreground: Cell::new(Some(WindowHandle(0x100))),
                open: Cell::new(true),
                mode: Cell::new(ConversionMode::NATIVE),
                sends: Cell::new(0),
                trims: Cell::new(0),
                dpi: Cell::new(None),
                panic_on_foreground: Cell::new(false),
            }
        }
    }

    impl CursorSource for FakeDesktop {
        fn cursor_visible(&self) -> bool {
            self.cursor_visible.get()
        }
        fn cursor_position(&self) -> Option<Point> {
            self.cursor.get()
        }
    }

    impl FocusSource for FakeDesktop {
        fn foreground_window(&self) -> Option<WindowHandle> {
            if self.panic_on_foreground.get() {
                panic!("foreground lookup exploded");
            }
            self.foreground.get()
        }
        fn window_thread(&self, _: WindowHandle) -> Option<UiThreadId> {
            Some(UiThreadId(9))
        }
        fn thread_focus(&self, _: UiThreadId) -> Option<WindowHandle> {
            Some(WindowHandle(0x101))
        }
    }

    impl ImeChannel for FakeDesktop {
        fn default_ime_window(&self, window: WindowHandle) -> Option<WindowHandle> {
            assert_eq!(window, WindowHandle(0x101), "probe must target the focus child");
            Some(WindowHandle(0x200))
        }
        fn send_bounded(&self, _: WindowHandle, request: ImeRequest, _: Duration) -> Bounded<isize> {
            self.sends.set(self.sends.get() + 1);
            match request {
                ImeRequest::OpenStatus => Bounded::Ok(self.open.get() as isize),
                ImeRequest::ConversionMode => Bounded::Ok(self.mode.get() as isize),
            }
        }
    }

    impl WorkingSet for FakeDesktop {
        fn compact_and_trim(&self) -> MonitorResult<()> {
            self.trims.set(self.trims.get() + 1);
            Ok(())
        }
    }

    impl DpiSource for FakeDesktop {
        fn take_dpi_change(&self) -> Option<DpiScale> {
            self.dpi.take()
        }
    }

    fn setup() -> (Monitor, FakeDesktop, Recorder, Instant) {
        let t0 = Instant::now();
        (
            Monitor::new(Settings::default(), t0),
            FakeDesktop::default(),
            Recorder::default(),
            t0,
        )
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn visible_tick_probes_classifies_and_places() {
        let (mut m, d, mut r, t0) = setup();
        let next = m.tick(t0, &d, &mut r);
        assert_eq!(next, ms(10));
        assert_eq!(r.calls, vec!["text あ", "move 115 115", "visible true"]);
        assert_eq!(
            *m.indicator(),
            IndicatorState {
                visible: true,
                glyph: "あ",
                position: Point { x: 115, y: 115 },
            }
        );
    }

    #[test]
    fn hidden_cursor_skips_probe_and_position() {
        let (mut m, d, mut r, t0) = setup();
        m.tick(t0, &d, &mut r);
        r.calls.clear();
        let sends = d.sends.get();

        d.cursor_visible.set(false);
        d.cursor.set(Some(Point { x: 500, y: 500 }));
        m.tick(t0 + ms(200), &d, &mut r);
        assert_eq!(r.calls, vec!["visible false"]);
        assert!(!m.indicator().visible);
        assert_eq!(m.indicator().position, Point { x: 115, y: 115 });
        assert_eq!(d.sends.get(), sends);
    }

    #[test]
    fn hidden_cursor_is_ignored_when_not_configured() {
        let (mut m, d, mut r, t0) = setup();
        m.controls()
            .settings()
            .update(|s| s.poll.set_hide_when_cursor_hidden(false));
        d.cursor_visible.set(false);
        m.tick(t0, &d, &mut r);
        assert!(m.indicator().visible);
    }

    #[test]
    fn no_foreground_hides() {
        let (mut m, d, mut r, t0) = setup();
        m.tick(t0, &d, &mut r);
        d.foreground.set(None);
        m.tick(t0 + ms(10), &d, &mut r);
        assert!(!m.indicator().visible);
    }

    #[test]
    fn probe_is_rate_limited_to_one_per_100ms() {
        let (mut m, d, mut r, t0) = setup();
        for i in 0..10 {
            m.tick(t0 + ms(i * 10), &d, &mut r);
        }
        // open + mode = two sends per probe
        assert_eq!(d.sends.get(), 2);
        m.tick(t0 + ms(100), &d, &mut r);
        assert_eq!(d.sends.get(), 4);
    }

    #[test]
    fn text_is_rewritten_only_on_change() {
        let (mut m, d, mut r, t0) = setup();
        m.tick(t0, &d, &mut r);
        m.tick(t0 + ms(100), &d, &mut r);
        d.mode
            .set(ConversionMode::NATIVE | ConversionMode::KATAKANA | ConversionMode::FULLSHAPE);
        m.tick(t0 + ms(200), &d, &mut r);
        d.open.set(false);
        m.tick(t0 + ms(300), &d, &mut r);
        let texts: Vec<_> = r.calls.iter().filter(|c| c.starts_with("text")).collect();
        assert_eq!(texts, vec!["text あ", "text カ", "text A"]);
    }

    #[test]
    fn panic_inside_tick_hides_and_next_tick_recovers() {
        let (mut m, d, mut r, t0) = setup();
        m.tick(t0, &d, &mut r);
        d.panic_on_foreground.set(true);
        let next = m.tick(t0 + ms(10), &d, &mut r);
        assert_eq!(next, ms(10));
        assert!(!m.indicator().visible);
        d.panic_on_foreground.set(false);
        m.tick(t0 + ms(20), &d, &mut r);
        assert!(m.indicator().visible);
    }

    #[test]
    fn reclaim_runs_on_its_own_schedule_even_when_hidden() {
        let (mut m, d, mut r, t0) = setup();
        d.foreground.set(None);
        m.tick(t0 + ms(10), &d, &mut r);
        assert_eq!(d.trims.get(), 0);
        m.tick(t0 + Duration::from_secs(30), &d, &mut r);
        assert_eq!(d.trims.get(), 1);
    }

    #[test]
    fn force_reclaim_runs_on_next_tick_once() {
        let (mut m, d, mut r, t0) = setup();
        m.controls().force_reclaim();
        m.tick(t0 + ms(10), &d, &mut r);
        m.tick(t0 + ms(20), &d, &mut r);
        assert_eq!(d.trims.get(), 1);
    }

    #[test]
    fn live_settings_apply_on_next_tick_and_reset_restores() {
        let (mut m, d, mut r, t0) = setup();
        let controls = m.controls();
        controls.settings().update(|s| {
            s.poll.set_interval_ms(1000);
            s.poll.set_offset(0, 0);
        });
        assert_eq!(m.tick(t0, &d, &mut r), ms(100));
        assert_eq!(m.indicator().position, Point { x: 105, y: 105 });
        assert_eq!(r.configured, 1);

        controls.reset_to_defaults();
        assert_eq!(m.tick(t0 + ms(10), &d, &mut r), ms(10));
        assert_eq!(m.indicator().position, Point { x: 115, y: 115 });
    }

    #[test]
    fn dpi_notification_changes_placement() {
        let (mut m, d, mut r, t0) = setup();
        d.dpi.set(Some(DpiScale::from_dpi(192, 192)));
        d.cursor.set(Some(Point { x: 200, y: 200 }));
        m.tick(t0, &d, &mut r);
        assert_eq!(m.indicator().position, Point { x: 115, y: 115 });
    }

    #[test]
    fn extreme_offset_keeps_indicator_visible() {
        let (mut m, d, mut r, t0) = setup();
        m.controls()
            .settings()
            .update(|s| s.poll.set_offset(i32::MAX, i32::MIN));
        for i in 0..5 {
            m.tick(t0 + ms(i * 10), &d, &mut r);
        }
        assert!(m.indicator().visible);
        assert_eq!(
            m.indicator().position,
            Point {
                x: i32::MAX,
                y: i32::MIN + 105
            }
        );
    }
}
