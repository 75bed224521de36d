//! Error taxonomy for the probing core.
//!
//! None of these are fatal. The monitor degrades every variant to "hide the indicator for
//! this tick" or "show the closed glyph", and the scheduling loop keeps running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The IME window could not be reached or did not answer within the deadline.
    #[error("IME status unavailable: {0}")]
    StatusUnavailable(&'static str),
    /// No foreground window (or focus target) could be resolved this tick.
    #[error("no resolvable foreground window")]
    ForegroundUnavailable,
    /// The OS declined the compaction / working-set trim request.
    #[error("resource reclaim declined: {0}")]
    ReclaimFailure(String),
    /// A tick panicked; contained at the tick boundary.
    #[error("tick aborted: {0}")]
    TickAborted(String),
}

pub type MonitorResult<T> = Result<T, MonitorError>;
