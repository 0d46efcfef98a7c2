//! Time base feeding every timed operation.
//!
//! Deadlines are absolute `TIME_UTC` points, as in C11 `<threads.h>`. The
//! blocking backends wait on `Instant`s, so a deadline is converted once per
//! wait via [`deadline_instant`]; wall-clock steps during a wait are not
//! tracked.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::status::{SyncError, SyncResult};
use crate::sys;

/// Nanoseconds per second.
pub const NSEC_PER_SEC: i64 = 1_000_000_000;

/// `timespec_get` base for the realtime (wall) clock.
pub const TIME_UTC: i32 = 1;
/// `timespec_get` base for the monotonic clock.
pub const TIME_MONOTONIC: i32 = 2;

/// Longest single backend wait. Longer deadlines are waited in slices.
const MAX_WAIT_SLICE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Seconds + nanoseconds point or span.
///
/// Ordering is lexicographic on `(tv_sec, tv_nsec)`, which is the time order
/// for normalized values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    /// Seconds.
    pub tv_sec: i64,
    /// Nanoseconds (0 to 999_999_999 once normalized).
    pub tv_nsec: i64,
}

impl Timespec {
    pub const ZERO: Self = Self {
        tv_sec: 0,
        tv_nsec: 0,
    };

    /// Build a normalized value. Nanoseconds outside `[0, 1e9)` carry into
    /// seconds; the seconds field saturates.
    #[must_use]
    pub const fn new(tv_sec: i64, tv_nsec: i64) -> Self {
        Self {
            tv_sec: tv_sec.saturating_add(tv_nsec.div_euclid(NSEC_PER_SEC)),
            tv_nsec: tv_nsec.rem_euclid(NSEC_PER_SEC),
        }
    }

    #[must_use]
    pub const fn normalize(self) -> Self {
        Self::new(self.tv_sec, self.tv_nsec)
    }

    /// True when `tv_nsec` is already in range.
    #[must_use]
    pub const fn is_normalized(&self) -> bool {
        self.tv_nsec >= 0 && self.tv_nsec < NSEC_PER_SEC
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        let n = self.normalize();
        n.tv_sec < 0
    }

    #[must_use]
    pub fn from_duration(d: Duration) -> Self {
        Self {
            tv_sec: i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
            tv_nsec: i64::from(d.subsec_nanos()),
        }
    }

    /// Convert a non-negative span to a `Duration`; `None` when negative.
    #[must_use]
    pub fn to_duration(self) -> Option<Duration> {
        let n = self.normalize();
        let secs = u64::try_from(n.tv_sec).ok()?;
        // normalized tv_nsec always fits
        Some(Duration::new(secs, n.tv_nsec as u32))
    }

    /// Saturating sum.
    #[must_use]
    pub const fn add(self, other: Self) -> Self {
        let a = self.normalize();
        let b = other.normalize();
        Self::new(a.tv_sec.saturating_add(b.tv_sec), a.tv_nsec + b.tv_nsec)
    }

    /// Span from `other` to `self`, clamped at zero.
    #[must_use]
    pub const fn sub(self, other: Self) -> Self {
        let a = self.normalize();
        let b = other.normalize();
        let diff = Self::new(a.tv_sec.saturating_sub(b.tv_sec), a.tv_nsec - b.tv_nsec);
        if diff.tv_sec < 0 { Self::ZERO } else { diff }
    }

    #[must_use]
    pub fn add_duration(self, d: Duration) -> Self {
        self.add(Self::from_duration(d))
    }

    /// Total nanoseconds, saturating.
    #[must_use]
    pub const fn as_nanos(&self) -> i128 {
        let n = self.normalize();
        n.tv_sec as i128 * NSEC_PER_SEC as i128 + n.tv_nsec as i128
    }
}

/// Clock sources accepted by [`now`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clock {
    /// Wall clock (`TIME_UTC`). Deadlines are expressed against this clock.
    Realtime,
    /// Steady clock (`TIME_MONOTONIC`), unaffected by wall-clock steps.
    Monotonic,
}

impl Clock {
    /// Map a `timespec_get` base to a clock.
    #[must_use]
    pub const fn from_base(base: i32) -> Option<Self> {
        match base {
            TIME_UTC => Some(Self::Realtime),
            TIME_MONOTONIC => Some(Self::Monotonic),
            _ => None,
        }
    }

    #[must_use]
    pub const fn base(self) -> i32 {
        match self {
            Self::Realtime => TIME_UTC,
            Self::Monotonic => TIME_MONOTONIC,
        }
    }
}

/// Current wall-clock time. Times before the epoch come back negative.
#[must_use]
pub fn realtime_now() -> Timespec {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since) => Timespec::from_duration(since),
        Err(before) => {
            let back = Timespec::from_duration(before.duration());
            Timespec::new(-back.tv_sec, -back.tv_nsec)
        }
    }
}

/// Read `clock`.
pub fn now(clock: Clock) -> SyncResult<Timespec> {
    match clock {
        Clock::Realtime => Ok(realtime_now()),
        Clock::Monotonic => sys::clock::monotonic_now().ok_or(SyncError::Error),
    }
}

/// Absolute realtime deadline `offset` from now.
#[must_use]
pub fn deadline_after(offset: Duration) -> Timespec {
    realtime_now().add_duration(offset)
}

/// Time left before `deadline`, zero once it has passed.
#[must_use]
pub fn remaining(deadline: &Timespec) -> Duration {
    deadline
        .sub(realtime_now())
        .to_duration()
        .unwrap_or_default()
}

/// Convert a realtime deadline into a backend wait target.
///
/// Returns `(instant, truncated)`; `truncated` is set when the deadline lies
/// beyond one wait slice and the caller must wait again after expiry.
#[must_use]
pub fn deadline_instant(deadline: &Timespec) -> (Instant, bool) {
    let left = remaining(deadline);
    let now = Instant::now();
    if left > MAX_WAIT_SLICE {
        (now + MAX_WAIT_SLICE, true)
    } else {
        (now + left, false)
    }
}

/// Run `attempt` against successive wait targets until it yields a value or
/// `deadline` passes.
pub(crate) fn until_deadline<T>(
    deadline: &Timespec,
    mut attempt: impl FnMut(Instant) -> Option<T>,
) -> SyncResult<T> {
    loop {
        let (at, truncated) = deadline_instant(deadline);
        if let Some(value) = attempt(at) {
            return Ok(value);
        }
        if !truncated {
            return Err(SyncError::TimedOut);
        }
    }
}
