//! Condition variable.
//!
//! The governing mutex is supplied per wait. Waiting requires the caller to
//! hold it; it is released atomically with entering the wait set and held
//! again on every return, including `TimedOut`. Spurious wakes are allowed,
//! so callers re-check their predicate (see [`Condvar::wait_while`]).
//!
//! While any thread waits, the condvar is bound to that thread's mutex. A
//! wait with a different mutex is rejected with `Error` until every waiter
//! has left.

use parking_lot::Mutex as StateCell;

use crate::status::{SyncError, SyncResult};
use crate::sys::{RawCondOps, RawCondvar, RawLock};
use crate::time::{Timespec, until_deadline};

pub(crate) mod sealed {
    use crate::status::SyncResult;
    use crate::sys::RawLock;

    pub trait Sealed {
        fn raw_lock(&self) -> &RawLock;
        /// Check the caller holds the lock and clear owner bookkeeping
        /// before the raw wait releases it. Returns the hold depth to
        /// restore.
        fn begin_wait(&self) -> SyncResult<u32>;
        fn end_wait(&self, depth: u32);
    }
}

/// Mutex types a [`Condvar`] can wait with.
pub trait CondLock: sealed::Sealed {}

impl<T: sealed::Sealed> CondLock for T {}

pub struct Condvar {
    raw: RawCondvar,
    binding: StateCell<Binding>,
}

/// The mutex current waiters use, by address, and how many there are.
#[derive(Default)]
struct Binding {
    lock: usize,
    waiters: usize,
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts the caller as a waiter bound to `lock`; leaves even if a wait
/// unwinds.
struct WaitTicket<'a>(&'a StateCell<Binding>);

impl<'a> WaitTicket<'a> {
    fn enter(binding: &'a StateCell<Binding>, lock: &RawLock) -> SyncResult<Self> {
        let addr = std::ptr::from_ref(lock) as usize;
        let mut b = binding.lock();
        if b.waiters > 0 && b.lock != addr {
            return Err(SyncError::Error);
        }
        b.lock = addr;
        b.waiters += 1;
        Ok(Self(binding))
    }
}

impl Drop for WaitTicket<'_> {
    fn drop(&mut self) {
        let mut b = self.0.lock();
        b.waiters -= 1;
        if b.waiters == 0 {
            b.lock = 0;
        }
    }
}

impl Condvar {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: RawCondvar::new(),
            binding: StateCell::new(Binding::default()),
        }
    }

    /// Wake at least one waiter, if any.
    pub fn signal(&self) -> SyncResult {
        self.raw.notify_one();
        Ok(())
    }

    /// Wake every current waiter.
    pub fn broadcast(&self) -> SyncResult {
        self.raw.notify_all();
        Ok(())
    }

    /// `Error` when the caller does not hold `mutex`, or when other
    /// threads are waiting with a different mutex.
    pub fn wait<M: CondLock>(&self, mutex: &M) -> SyncResult {
        let ticket = WaitTicket::enter(&self.binding, mutex.raw_lock())?;
        let depth = mutex.begin_wait()?;
        self.raw.wait(mutex.raw_lock());
        drop(ticket);
        mutex.end_wait(depth);
        Ok(())
    }

    /// Wait until notified or the absolute realtime `deadline` passes.
    /// The mutex is held again when this returns `TimedOut`.
    pub fn timed_wait<M: CondLock>(&self, mutex: &M, deadline: &Timespec) -> SyncResult {
        let lock: &RawLock = mutex.raw_lock();
        let ticket = WaitTicket::enter(&self.binding, lock)?;
        let depth = mutex.begin_wait()?;
        let outcome =
            until_deadline(deadline, |at| (!self.raw.wait_until(lock, at)).then_some(()));
        drop(ticket);
        mutex.end_wait(depth);
        outcome
    }

    /// Wait while `condition` holds, absorbing spurious wakes.
    pub fn wait_while<M: CondLock>(
        &self,
        mutex: &M,
        mut condition: impl FnMut() -> bool,
    ) -> SyncResult {
        while condition() {
            self.wait(mutex)?;
        }
        Ok(())
    }

    /// Threads currently blocked in `wait`/`timed_wait`.
    #[must_use]
    pub fn waiters(&self) -> usize {
        self.binding.lock().waiters
    }

    /// `Busy` while any thread waits on it.
    pub fn check_destroy(&self) -> SyncResult {
        if self.waiters() > 0 {
            Err(SyncError::Busy)
        } else {
            Ok(())
        }
    }
}
