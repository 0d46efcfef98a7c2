//! Platform clock reads and sleeps.

use crate::time::Timespec;

#[cfg(unix)]
pub fn monotonic_now() -> Option<Timespec> {
    // SAFETY: timespec is plain data; zero is a valid bit pattern.
    let mut ts: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: `ts` is a valid, writable timespec.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    (rc == 0).then(|| Timespec::new(ts.tv_sec as i64, ts.tv_nsec as i64))
}

#[cfg(not(unix))]
pub fn monotonic_now() -> Option<Timespec> {
    use std::sync::OnceLock;
    use std::time::Instant;

    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = *ANCHOR.get_or_init(Instant::now);
    Some(Timespec::from_duration(anchor.elapsed()))
}

/// Sleep for a normalized, non-negative `span`.
///
/// `Err(remaining)` when a signal cut the sleep short.
#[cfg(unix)]
pub fn sleep_for(span: Timespec) -> Result<(), Timespec> {
    // SAFETY: timespec is plain data; zero is a valid bit pattern.
    let mut req: libc::timespec = unsafe { std::mem::zeroed() };
    req.tv_sec = span.tv_sec as libc::time_t;
    req.tv_nsec = span.tv_nsec as libc::c_long;
    // SAFETY: as above.
    let mut rem: libc::timespec = unsafe { std::mem::zeroed() };
    // SAFETY: both pointers reference live timespecs owned by this frame.
    let rc = unsafe { libc::nanosleep(&req, &mut rem) };
    if rc == 0 {
        Ok(())
    } else {
        Err(Timespec::new(rem.tv_sec as i64, rem.tv_nsec as i64))
    }
}

#[cfg(not(unix))]
pub fn sleep_for(span: Timespec) -> Result<(), Timespec> {
    if let Some(d) = span.to_duration() {
        std::thread::sleep(d);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_reads_succeed() {
        let a = monotonic_now().unwrap();
        let b = monotonic_now().unwrap();
        assert!(a.is_normalized());
        assert!(b >= a);
    }

    #[test]
    fn short_sleep_completes() {
        let before = monotonic_now().unwrap();
        assert_eq!(sleep_for(Timespec::new(0, 2_000_000)), Ok(()));
        let after = monotonic_now().unwrap();
        assert!(after.sub(before) >= Timespec::new(0, 2_000_000));
    }
}
