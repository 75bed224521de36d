//! Tick driver and due-time tracking for periodic work.
//!
//! One control thread runs ticks back to back at the configured period. A slow tick delays
//! the next one; ticks are never queued or run concurrently. Work with its own, slower
//! cadence (IME probe, reclaim) is expressed as a [`Periodic`] polled from inside the tick.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tracing::info;

/// Due-time tracker for an action that must run at most once per `period`.
#[derive(Copy, Clone, Debug)]
pub struct Periodic {
    period: Duration,
    last: Option<Instant>,
}

impl Periodic {
    /// Due on the first poll.
    pub fn immediate(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// First due one full `period` after `start`.
    pub fn starting_at(period: Duration, start: Instant) -> Self {
        Self {
            period,
            last: Some(start),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        }
    }

    /// Returns true and records `now` as the last run when due.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.is_due(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }

    /// Record an out-of-band run at `now`.
    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

/// Run ticks until `pump` breaks.
///
/// `pump` receives how long to wait before the next tick (zero when the previous tick
/// overran its period) and must return once that time has passed or it wants to stop.
/// `tick` runs one pass and returns the period to arm next; a changed period therefore
/// takes effect on the following re-arm, never on a tick already running.
pub fn run<T, P>(mut tick: T, mut pump: P) -> u64
where
    T: FnMut(Instant) -> Duration,
    P: FnMut(Duration) -> ControlFlow<()>,
{
    let mut ticks = 0u64;
    let mut period = Duration::ZERO;
    let mut started = Instant::now();
    loop {
        let wait = period.saturating_sub(started.elapsed());
        if pump(wait).is_break() {
            break;
        }
        started = Instant::now();
        period = tick(started);
        ticks += 1;
    }
    info!(ticks, "scheduler stopped");
    ticks
}
