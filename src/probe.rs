//! IME open / conversion-mode probing of a foreign window.
//!
//! Protocol, strictly ordered:
//! 1. Resolve the default IME window of the focus target (local lookup, cannot hang).
//! 2. Ask it whether the IME is open, bounded by `timeout`.
//! 3. If open, ask for the conversion mode, same bound.
//!
//! Any step failing or timing out yields `retrieved = false`; there is no retry within the
//! tick. How often a probe runs is decided by the caller (see `monitor`), not here.

use std::time::Duration;

use tracing::trace;

use crate::classify::ConversionMode;
use crate::desktop::{Bounded, ImeChannel, ImeRequest, WindowHandle};
use crate::error::{MonitorError, MonitorResult};

/// Deadline for each cross-process query.
pub const SEND_TIMEOUT: Duration = Duration::from_millis(200);
/// Minimum wall-clock spacing between two probes.
pub const PROBE_PERIOD: Duration = Duration::from_millis(100);

/// Result of one probe attempt. Built fresh per attempt and dropped after classification.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub retrieved: bool,
    pub is_open: bool,
    pub conversion_mode: ConversionMode,
}

impl ProbeResult {
    pub fn unavailable() -> Self {
        Self::default()
    }

    fn closed() -> Self {
        Self {
            retrieved: true,
            ..Self::default()
        }
    }

    fn open(mode: ConversionMode) -> Self {
        Self {
            retrieved: true,
            is_open: true,
            conversion_mode: mode,
        }
    }
}

pub struct ImeProber {
    timeout: Duration,
}

impl Default for ImeProber {
    fn default() -> Self {
        Self::new(SEND_TIMEOUT)
    }
}

impl ImeProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probe `target`, folding every failure into `retrieved = false`.
    pub fn probe<C: ImeChannel + ?Sized>(&self, channel: &C, target: WindowHandle) -> ProbeResult {
        match self.query(channel, target) {
            Ok(result) => {
                trace!(
                    target = target.0,
                    open = result.is_open,
                    mode = %format_args!("0x{:04X}", result.conversion_mode.0),
                    "IME probe answered"
                );
                result
            }
            Err(e) => {
                trace!(target = target.0, %e, "IME probe unavailable");
                ProbeResult::unavailable()
            }
        }
    }

    fn query<C: ImeChannel + ?Sized>(
        &self,
        channel: &C,
        target: WindowHandle,
    ) -> MonitorResult<ProbeResult> {
        let ime = channel
            .default_ime_window(target)
            .ok_or(MonitorError::StatusUnavailable("no default IME window"))?;
        let open = self.ask(channel, ime, ImeRequest::OpenStatus)?;
        if open == 0 {
            return Ok(ProbeResult::closed());
        }
        let mode = self.ask(channel, ime, ImeRequest::ConversionMode)?;
        Ok(ProbeResult::open(ConversionMode(mode as u32)))
    }

    fn ask<C: ImeChannel + ?Sized>(
        &self,
        channel: &C,
        ime: WindowHandle,
        request: ImeRequest,
    ) -> MonitorResult<isize> {
        match channel.send_bounded(ime, request, self.timeout) {
            Bounded::Ok(v) => Ok(v),
            Bounded::TimedOut => Err(MonitorError::StatusUnavailable(match request {
                ImeRequest::OpenStatus => "open-status query timed out",
                ImeRequest::ConversionMode => "conversion-mode query timed out",
            })),
            Bounded::Failed => Err(MonitorError::StatusUnavailable(match request {
                ImeRequest::OpenStatus => "open-status query failed",
                ImeRequest::ConversionMode => "conversion-mode query failed",
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    /// Scripted IME window: answers are popped in order; records every request.
    struct Scripted {
        ime: Option<WindowHandle>,
        answers: RefCell<Vec<Bounded<isize>>>,
        seen: RefCell<Vec<ImeRequest>>,
    }

    impl Scripted {
        fn new(ime: Option<isize>, answers: Vec<Bounded<isize>>) -> Self {
            let mut answers = answers;
            answers.reverse();
            Self {
                ime: ime.map(WindowHandle),
                answers: RefCell::new(answers),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl ImeChannel for Scripted {
        fn default_ime_window(&self, _window: WindowHandle) -> Option<WindowHandle> {
            self.ime
        }

        fn send_bounded(&self, _: WindowHandle, request: ImeRequest, _: Duration) -> Bounded<isize> {
            self.seen.borrow_mut().push(request);
            self.answers.borrow_mut().pop().unwrap_or(Bounded::Failed)
        }
    }

    /// IME window served by a thread that answers the first `answered` requests with 1 and
    /// then stops replying.
    struct Unresponsive {
        inbox: mpsc::Sender<mpsc::Sender<isize>>,
    }

    impl Unresponsive {
        fn spawn(mut answered: usize) -> Self {
            let (inbox, requests) = mpsc::channel::<mpsc::Sender<isize>>();
            thread::spawn(move || {
                // Unanswered reply channels stay open until the fake is dropped.
                let mut parked = Vec::new();
                while let Ok(reply) = requests.recv() {
                    if answered > 0 {
                        answered -= 1;
                        let _ = reply.send(1);
                    } else {
                        parked.push(reply);
                    }
                }
            });
            Self { inbox }
        }
    }

    impl ImeChannel for Unresponsive {
        fn default_ime_window(&self, _window: WindowHandle) -> Option<WindowHandle> {
            Some(WindowHandle(0x77))
        }

        fn send_bounded(&self, _: WindowHandle, _: ImeRequest, timeout: Duration) -> Bounded<isize> {
            let (reply, answer) = mpsc::channel();
            if self.inbox.send(reply).is_err() {
                return Bounded::Failed;
            }
            match answer.recv_timeout(timeout) {
                Ok(v) => Bounded::Ok(v),
                Err(mpsc::RecvTimeoutError::Timeout) => Bounded::TimedOut,
                Err(mpsc::RecvTimeoutError::Disconnected) => Bounded::Failed,
            }
        }
    }

    const TARGET: WindowHandle = WindowHandle(0x10);

    #[test]
    fn open_ime_reports_conversion_mode() {
        let ch = Scripted::new(Some(1), vec![Bounded::Ok(1), Bounded::Ok(0x0B)]);
        let r = ImeProber::default().probe(&ch, TARGET);
        assert!(r.retrieved);
        assert!(r.is_open);
        assert_eq!(r.conversion_mode, ConversionMode(0x0B));
        assert_eq!(
            *ch.seen.borrow(),
            vec![ImeRequest::OpenStatus, ImeRequest::ConversionMode]
        );
    }

    #[test]
    fn closed_ime_skips_mode_query() {
        let ch = Scripted::new(Some(1), vec![Bounded::Ok(0), Bounded::Ok(0x09)]);
        let r = ImeProber::default().probe(&ch, TARGET);
        assert!(r.retrieved);
        assert!(!r.is_open);
        assert_eq!(*ch.seen.borrow(), vec![ImeRequest::OpenStatus]);
    }

    #[test]
    fn missing_ime_window_sends_nothing() {
        let ch = Scripted::new(None, vec![Bounded::Ok(1)]);
        let r = ImeProber::default().probe(&ch, TARGET);
        assert_eq!(r, ProbeResult::unavailable());
        assert!(ch.seen.borrow().is_empty());
    }

    #[test]
    fn timeout_on_open_status_is_unavailable_without_retry() {
        let ch = Scripted::new(Some(1), vec![Bounded::TimedOut, Bounded::Ok(1)]);
        let r = ImeProber::default().probe(&ch, TARGET);
        assert!(!r.retrieved);
        assert_eq!(ch.seen.borrow().len(), 1);
    }

    #[test]
    fn failure_on_mode_query_discards_open_flag() {
        let ch = Scripted::new(Some(1), vec![Bounded::Ok(1), Bounded::Failed]);
        let r = ImeProber::default().probe(&ch, TARGET);
        assert_eq!(r, ProbeResult::unavailable());
    }

    #[test]
    fn hung_target_returns_within_deadline() {
        let ch = Unresponsive::spawn(0);
        let start = Instant::now();
        let r = ImeProber::default().probe(&ch, TARGET);
        let elapsed = start.elapsed();
        assert!(!r.retrieved);
        assert!(elapsed >= SEND_TIMEOUT);
        assert!(
            elapsed < SEND_TIMEOUT + Duration::from_millis(300),
            "probe blocked for {elapsed:?}"
        );
    }

    #[test]
    fn hang_on_mode_query_bounds_the_probe_at_two_deadlines() {
        let ch = Unresponsive::spawn(1);
        let start = Instant::now();
        let r = ImeProber::default().probe(&ch, TARGET);
        let elapsed = start.elapsed();
        assert_eq!(r, ProbeResult::unavailable());
        assert!(elapsed >= SEND_TIMEOUT, "mode query returned early: {elapsed:?}");
        assert!(
            elapsed < SEND_TIMEOUT * 2 + Duration::from_millis(300),
            "probe blocked for {elapsed:?}"
        );
    }
}
