//! Periodic, best-effort memory housekeeping.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::desktop::WorkingSet;
use crate::schedule::Periodic;

pub const RECLAIM_PERIOD: Duration = Duration::from_secs(30);

pub struct Reclaimer {
    due: Periodic,
}

impl Reclaimer {
    pub fn new(start: Instant) -> Self {
        Self {
            due: Periodic::starting_at(RECLAIM_PERIOD, start),
        }
    }

    /// Run a pass if due (or `forced`). Returns whether a pass was attempted.
    ///
    /// Failures are logged and dropped; the next attempt waits for the next due time.
    pub fn poll<W: WorkingSet + ?Sized>(&mut self, now: Instant, forced: bool, ws: &W) -> bool {
        if forced {
            self.due.mark(now);
        } else if !self.due.poll(now) {
            return false;
        }
        match ws.compact_and_trim() {
            Ok(()) => trace!(forced, "working set trimmed"),
            Err(e) => debug!(%e, "reclaim declined"),
        }
        true
    }
}
