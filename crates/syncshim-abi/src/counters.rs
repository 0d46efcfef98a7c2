//! Process-wide outcome counters for ABI entry points.
//!
//! Every result-code entry point bumps `calls` plus the bucket for its
//! outcome. The harness reads these to cross-check its own tallies.

use std::ffi::c_int;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{THRD_BUSY, THRD_NOMEM, THRD_SUCCESS, THRD_TIMEDOUT};

static CALLS: AtomicU64 = AtomicU64::new(0);
static ERROR_RETURNS: AtomicU64 = AtomicU64::new(0);
static BUSY_RETURNS: AtomicU64 = AtomicU64::new(0);
static TIMEDOUT_RETURNS: AtomicU64 = AtomicU64::new(0);
static NOMEM_RETURNS: AtomicU64 = AtomicU64::new(0);

/// Snapshot of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultCounters {
    pub calls: u64,
    pub error: u64,
    pub busy: u64,
    pub timed_out: u64,
    pub no_mem: u64,
}

impl ResultCounters {
    /// Per-field growth from `earlier` to `self`.
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            calls: self.calls.saturating_sub(earlier.calls),
            error: self.error.saturating_sub(earlier.error),
            busy: self.busy.saturating_sub(earlier.busy),
            timed_out: self.timed_out.saturating_sub(earlier.timed_out),
            no_mem: self.no_mem.saturating_sub(earlier.no_mem),
        }
    }
}

pub(crate) fn record(code: c_int) {
    CALLS.fetch_add(1, Ordering::Relaxed);
    let bucket = match code {
        THRD_SUCCESS => return,
        THRD_BUSY => &BUSY_RETURNS,
        THRD_TIMEDOUT => &TIMEDOUT_RETURNS,
        THRD_NOMEM => &NOMEM_RETURNS,
        _ => &ERROR_RETURNS,
    };
    bucket.fetch_add(1, Ordering::Relaxed);
}

#[must_use]
pub fn result_counters() -> ResultCounters {
    ResultCounters {
        calls: CALLS.load(Ordering::Relaxed),
        error: ERROR_RETURNS.load(Ordering::Relaxed),
        busy: BUSY_RETURNS.load(Ordering::Relaxed),
        timed_out: TIMEDOUT_RETURNS.load(Ordering::Relaxed),
        no_mem: NOMEM_RETURNS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{THRD_ERROR, THRD_SUCCESS};

    #[test]
    fn outcomes_land_in_their_bucket() {
        let before = result_counters();
        record(THRD_SUCCESS);
        record(THRD_BUSY);
        record(THRD_TIMEDOUT);
        record(THRD_NOMEM);
        record(THRD_ERROR);
        record(-99);
        let delta = result_counters().since(&before);
        assert!(delta.calls >= 6);
        assert!(delta.busy >= 1);
        assert!(delta.timed_out >= 1);
        assert!(delta.no_mem >= 1);
        assert!(delta.error >= 2);
    }
}
