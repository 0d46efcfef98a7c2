//! `parking_lot` backend.
//!
//! Guards are forgotten on acquire and released with `force_unlock`, which
//! lets the owner-tracking layer hold a lock across calls without carrying a
//! guard.

use std::mem;
use std::time::Instant;

use parking_lot::lock_api::{RawRwLock as _, RawRwLockTimed as _};

use super::{RawCondOps, RawLockOps, RawOnceOps, RawRwLockOps};

pub struct RawLock {
    inner: parking_lot::Mutex<()>,
}

impl RawLockOps for RawLock {
    fn new() -> Self {
        Self {
            inner: parking_lot::Mutex::new(()),
        }
    }

    fn lock(&self) {
        mem::forget(self.inner.lock());
    }

    fn try_lock(&self) -> bool {
        self.inner.try_lock().map(mem::forget).is_some()
    }

    fn try_lock_until(&self, deadline: Instant) -> bool {
        self.inner.try_lock_until(deadline).map(mem::forget).is_some()
    }

    fn unlock(&self) {
        // SAFETY: callers only release a lock they acquired through this type.
        unsafe { self.inner.force_unlock() }
    }

    fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

pub struct RawCondvar {
    inner: parking_lot::Condvar,
}

impl RawCondOps for RawCondvar {
    type Lock = RawLock;

    fn new() -> Self {
        Self {
            inner: parking_lot::Condvar::new(),
        }
    }

    fn wait(&self, lock: &RawLock) {
        // SAFETY: the caller holds `lock`; the guard is forgotten afterwards
        // so the lock stays held on return.
        let mut guard = unsafe { lock.inner.make_guard_unchecked() };
        self.inner.wait(&mut guard);
        mem::forget(guard);
    }

    fn wait_until(&self, lock: &RawLock, deadline: Instant) -> bool {
        // SAFETY: as in `wait`.
        let mut guard = unsafe { lock.inner.make_guard_unchecked() };
        let timed_out = self.inner.wait_until(&mut guard, deadline).timed_out();
        mem::forget(guard);
        timed_out
    }

    fn notify_one(&self) {
        self.inner.notify_one();
    }

    fn notify_all(&self) {
        self.inner.notify_all();
    }
}

pub struct RawRwLock {
    inner: parking_lot::RawRwLock,
}

impl RawRwLockOps for RawRwLock {
    fn new() -> Self {
        Self {
            inner: <parking_lot::RawRwLock as parking_lot::lock_api::RawRwLock>::INIT,
        }
    }

    fn read(&self) {
        self.inner.lock_shared();
    }

    fn try_read(&self) -> bool {
        self.inner.try_lock_shared()
    }

    fn try_read_until(&self, deadline: Instant) -> bool {
        self.inner.try_lock_shared_until(deadline)
    }

    fn write(&self) {
        self.inner.lock_exclusive();
    }

    fn try_write(&self) -> bool {
        self.inner.try_lock_exclusive()
    }

    fn try_write_until(&self, deadline: Instant) -> bool {
        self.inner.try_lock_exclusive_until(deadline)
    }

    fn unlock_read(&self) {
        // SAFETY: the caller holds a shared lock.
        unsafe { self.inner.unlock_shared() }
    }

    fn unlock_write(&self) {
        // SAFETY: the caller holds the exclusive lock.
        unsafe { self.inner.unlock_exclusive() }
    }

    fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}

pub struct RawOnce {
    inner: parking_lot::Once,
}

impl RawOnceOps for RawOnce {
    const INIT: Self = Self {
        inner: parking_lot::Once::new(),
    };

    fn call_once<F: FnOnce()>(&self, f: F) {
        // `_force` so a panicked attempt is retried instead of poisoning.
        self.inner.call_once_force(|_| f());
    }

    fn is_completed(&self) -> bool {
        self.inner.state().done()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lock_survives_without_guard() {
        let l = RawLock::new();
        l.lock();
        assert!(l.is_locked());
        assert!(!l.try_lock());
        l.unlock();
        assert!(l.try_lock());
        l.unlock();
    }

    #[test]
    fn timed_lock_gives_up() {
        let l = RawLock::new();
        l.lock();
        assert!(!l.try_lock_until(Instant::now() + Duration::from_millis(10)));
        l.unlock();
    }

    #[test]
    fn cond_wait_until_times_out_holding_lock() {
        let l = RawLock::new();
        let c = RawCondvar::new();
        l.lock();
        assert!(c.wait_until(&l, Instant::now() + Duration::from_millis(10)));
        assert!(l.is_locked());
        l.unlock();
    }

    #[test]
    fn rwlock_shared_then_exclusive() {
        let rw = RawRwLock::new();
        rw.read();
        assert!(rw.try_read());
        assert!(!rw.try_write());
        rw.unlock_read();
        rw.unlock_read();
        assert!(rw.try_write());
        assert!(!rw.try_read());
        rw.unlock_write();
    }

    #[test]
    fn once_retries_after_panic() {
        let once = RawOnce::INIT;
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            once.call_once(|| panic!("boom"));
        }));
        assert!(r.is_err());
        assert!(!once.is_completed());
        let mut ran = false;
        once.call_once(|| ran = true);
        assert!(ran);
        assert!(once.is_completed());
    }
}
