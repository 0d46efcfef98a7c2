//! Portable backend: explicit state machines.
//!
//! Each primitive keeps its whole state behind one short critical section
//! (`parking_lot::Mutex`) and parks blocked threads on a wake channel
//! (`parking_lot::Condvar`). The critical section is never held across user
//! code or across a wait on a different primitive.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

use parking_lot::{Condvar, Mutex, const_mutex};

use super::{RawCondOps, RawLockOps, RawOnceOps, RawRwLockOps};

// ---------------------------------------------------------------------------
// Lock
// ---------------------------------------------------------------------------

#[derive(Default)]
struct LockState {
    locked: bool,
    waiters: usize,
}

pub struct RawLock {
    state: Mutex<LockState>,
    wake: Condvar,
}

impl RawLockOps for RawLock {
    fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            wake: Condvar::new(),
        }
    }

    fn lock(&self) {
        let mut s = self.state.lock();
        while s.locked {
            s.waiters += 1;
            self.wake.wait(&mut s);
            s.waiters -= 1;
        }
        s.locked = true;
    }

    fn try_lock(&self) -> bool {
        let mut s = self.state.lock();
        if s.locked {
            return false;
        }
        s.locked = true;
        true
    }

    fn try_lock_until(&self, deadline: Instant) -> bool {
        let mut s = self.state.lock();
        while s.locked {
            s.waiters += 1;
            let timed_out = self.wake.wait_until(&mut s, deadline).timed_out();
            s.waiters -= 1;
            if timed_out && s.locked {
                return false;
            }
        }
        s.locked = true;
        true
    }

    fn unlock(&self) {
        let mut s = self.state.lock();
        s.locked = false;
        if s.waiters > 0 {
            self.wake.notify_one();
        }
    }

    fn is_locked(&self) -> bool {
        self.state.lock().locked
    }
}

// ---------------------------------------------------------------------------
// Condition variable
// ---------------------------------------------------------------------------

/// Generation-counted wait set.
///
/// A waiter records the generation it entered in. A signal bumps the
/// generation and adds one release; only waiters from an older generation
/// may consume a release, so a thread that starts waiting after a signal
/// cannot steal it.
#[derive(Default)]
struct CondState {
    waiters: usize,
    releases: usize,
    generation: u64,
}

impl CondState {
    fn try_consume(&mut self, entered: u64) -> bool {
        if self.releases > 0 && self.generation != entered {
            self.releases -= 1;
            true
        } else {
            false
        }
    }
}

pub struct RawCondvar {
    state: Mutex<CondState>,
    wake: Condvar,
}

impl RawCondvar {
    fn wait_inner(&self, lock: &RawLock, deadline: Option<Instant>) -> bool {
        let mut s = self.state.lock();
        s.waiters += 1;
        let entered = s.generation;
        // Released while the wait set is locked, so no signal can slip in
        // between the release and the enqueue.
        lock.unlock();

        let mut timed_out = false;
        while !s.try_consume(entered) {
            match deadline {
                None => self.wake.wait(&mut s),
                Some(at) => {
                    if self.wake.wait_until(&mut s, at).timed_out() {
                        timed_out = !s.try_consume(entered);
                        break;
                    }
                }
            }
        }

        s.waiters -= 1;
        if s.waiters == 0 {
            s.releases = 0;
        }
        drop(s);
        lock.lock();
        timed_out
    }
}

impl RawCondOps for RawCondvar {
    type Lock = RawLock;

    fn new() -> Self {
        Self {
            state: Mutex::new(CondState::default()),
            wake: Condvar::new(),
        }
    }

    fn wait(&self, lock: &RawLock) {
        self.wait_inner(lock, None);
    }

    fn wait_until(&self, lock: &RawLock, deadline: Instant) -> bool {
        self.wait_inner(lock, Some(deadline))
    }

    fn notify_one(&self) {
        let mut s = self.state.lock();
        if s.waiters > s.releases {
            s.releases += 1;
            s.generation = s.generation.wrapping_add(1);
            // The eligible waiter is unknown; the rest go back to sleep.
            self.wake.notify_all();
        }
    }

    fn notify_all(&self) {
        let mut s = self.state.lock();
        if s.waiters > s.releases {
            s.releases = s.waiters;
            s.generation = s.generation.wrapping_add(1);
            self.wake.notify_all();
        }
    }
}

// ---------------------------------------------------------------------------
// Read-write lock (writer-preferring)
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RwState {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

impl RwState {
    fn read_blocked(&self) -> bool {
        self.writer || self.waiting_writers > 0
    }

    fn write_blocked(&self) -> bool {
        self.writer || self.readers > 0
    }
}

pub struct RawRwLock {
    state: Mutex<RwState>,
    readers_wake: Condvar,
    writers_wake: Condvar,
}

impl RawRwLock {
    /// Hand the lock on after a writer leaves or gives up waiting.
    fn wake_after_writer(&self, s: &RwState) {
        if s.waiting_writers > 0 {
            self.writers_wake.notify_one();
        } else {
            self.readers_wake.notify_all();
        }
    }
}

impl RawRwLockOps for RawRwLock {
    fn new() -> Self {
        Self {
            state: Mutex::new(RwState::default()),
            readers_wake: Condvar::new(),
            writers_wake: Condvar::new(),
        }
    }

    fn read(&self) {
        let mut s = self.state.lock();
        while s.read_blocked() {
            self.readers_wake.wait(&mut s);
        }
        s.readers += 1;
    }

    fn try_read(&self) -> bool {
        let mut s = self.state.lock();
        if s.read_blocked() {
            return false;
        }
        s.readers += 1;
        true
    }

    fn try_read_until(&self, deadline: Instant) -> bool {
        let mut s = self.state.lock();
        while s.read_blocked() {
            if self.readers_wake.wait_until(&mut s, deadline).timed_out() && s.read_blocked() {
                return false;
            }
        }
        s.readers += 1;
        true
    }

    fn write(&self) {
        let mut s = self.state.lock();
        s.waiting_writers += 1;
        while s.write_blocked() {
            self.writers_wake.wait(&mut s);
        }
        s.waiting_writers -= 1;
        s.writer = true;
    }

    fn try_write(&self) -> bool {
        let mut s = self.state.lock();
        if s.write_blocked() {
            return false;
        }
        s.writer = true;
        true
    }

    fn try_write_until(&self, deadline: Instant) -> bool {
        let mut s = self.state.lock();
        s.waiting_writers += 1;
        while s.write_blocked() {
            if self.writers_wake.wait_until(&mut s, deadline).timed_out() && s.write_blocked() {
                s.waiting_writers -= 1;
                // Readers parked behind this writer may proceed now.
                if !s.writer {
                    self.wake_after_writer(&s);
                }
                return false;
            }
        }
        s.waiting_writers -= 1;
        s.writer = true;
        true
    }

    fn unlock_read(&self) {
        let mut s = self.state.lock();
        s.readers -= 1;
        if s.readers == 0 && s.waiting_writers > 0 {
            self.writers_wake.notify_one();
        }
    }

    fn unlock_write(&self) {
        let mut s = self.state.lock();
        s.writer = false;
        self.wake_after_writer(&s);
    }

    fn is_locked(&self) -> bool {
        let s = self.state.lock();
        s.writer || s.readers > 0
    }
}

// ---------------------------------------------------------------------------
// Once
// ---------------------------------------------------------------------------

const ONCE_INCOMPLETE: u8 = 0;
const ONCE_RUNNING: u8 = 1;
const ONCE_COMPLETE: u8 = 2;

// Shared by every once-flag; runs are rare and short-lived.
static ONCE_LOCK: Mutex<()> = const_mutex(());
static ONCE_WAKE: Condvar = Condvar::new();

pub struct RawOnce {
    state: AtomicU8,
}

/// Puts the flag back to incomplete if the initializer unwinds.
struct ResetOnUnwind<'a>(&'a AtomicU8);

impl Drop for ResetOnUnwind<'_> {
    fn drop(&mut self) {
        let _guard = ONCE_LOCK.lock();
        self.0.store(ONCE_INCOMPLETE, Ordering::Release);
        ONCE_WAKE.notify_all();
    }
}

impl RawOnceOps for RawOnce {
    const INIT: Self = Self {
        state: AtomicU8::new(ONCE_INCOMPLETE),
    };

    fn call_once<F: FnOnce()>(&self, f: F) {
        if self.state.load(Ordering::Acquire) == ONCE_COMPLETE {
            return;
        }
        {
            let mut guard = ONCE_LOCK.lock();
            loop {
                match self.state.load(Ordering::Acquire) {
                    ONCE_COMPLETE => return,
                    ONCE_RUNNING => ONCE_WAKE.wait(&mut guard),
                    _ => {
                        self.state.store(ONCE_RUNNING, Ordering::Relaxed);
                        break;
                    }
                }
            }
        }

        let reset = ResetOnUnwind(&self.state);
        f();
        std::mem::forget(reset);

        let _guard = ONCE_LOCK.lock();
        self.state.store(ONCE_COMPLETE, Ordering::Release);
        ONCE_WAKE.notify_all();
    }

    fn is_completed(&self) -> bool {
        self.state.load(Ordering::Acquire) == ONCE_COMPLETE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn lock_excludes_and_times_out() {
        let l = RawLock::new();
        l.lock();
        assert!(!l.try_lock());
        assert!(!l.try_lock_until(Instant::now() + Duration::from_millis(10)));
        l.unlock();
        assert!(!l.is_locked());
    }

    #[test]
    fn late_waiter_cannot_steal_signal() {
        let mut s = CondState::default();
        s.waiters = 1;
        let first = s.generation;
        s.releases = 1;
        s.generation += 1;
        s.waiters = 2;
        let late = s.generation;
        assert!(!s.try_consume(late));
        assert!(s.try_consume(first));
        assert!(!s.try_consume(first));
    }

    #[test]
    fn signal_without_waiters_is_dropped() {
        let c = RawCondvar::new();
        c.notify_one();
        c.notify_all();
        let s = c.state.lock();
        assert_eq!(s.releases, 0);
        assert_eq!(s.generation, 0);
    }

    #[test]
    fn cond_wait_wakes_on_signal() {
        let pair = Arc::new((RawLock::new(), RawCondvar::new(), AtomicUsize::new(0)));
        let p = Arc::clone(&pair);
        let waiter = thread::spawn(move || {
            let (l, c, flag) = &*p;
            l.lock();
            while flag.load(Ordering::Acquire) == 0 {
                c.wait(l);
            }
            l.unlock();
        });
        thread::sleep(Duration::from_millis(20));
        let (l, c, flag) = &*pair;
        l.lock();
        flag.store(1, Ordering::Release);
        c.notify_one();
        l.unlock();
        waiter.join().unwrap();
    }

    #[test]
    fn cond_timeout_reacquires() {
        let l = RawLock::new();
        let c = RawCondvar::new();
        l.lock();
        assert!(c.wait_until(&l, Instant::now() + Duration::from_millis(10)));
        assert!(l.is_locked());
        l.unlock();
        assert_eq!(c.state.lock().waiters, 0);
    }

    #[test]
    fn waiting_writer_blocks_new_readers() {
        let rw = Arc::new(RawRwLock::new());
        rw.read();
        let w = Arc::clone(&rw);
        let writer = thread::spawn(move || {
            w.write();
            w.unlock_write();
        });
        while rw.state.lock().waiting_writers == 0 {
            thread::yield_now();
        }
        assert!(!rw.try_read());
        rw.unlock_read();
        writer.join().unwrap();
        assert!(rw.try_read());
        rw.unlock_read();
    }

    #[test]
    fn timed_out_writer_releases_readers() {
        let rw = RawRwLock::new();
        rw.read();
        assert!(!rw.try_write_until(Instant::now() + Duration::from_millis(10)));
        assert_eq!(rw.state.lock().waiting_writers, 0);
        assert!(rw.try_read());
        rw.unlock_read();
        rw.unlock_read();
    }

    #[test]
    fn once_runs_once_and_retries_after_panic() {
        let once = RawOnce::INIT;
        let r = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            once.call_once(|| panic!("boom"));
        }));
        assert!(r.is_err());
        assert!(!once.is_completed());

        let count = AtomicUsize::new(0);
        once.call_once(|| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        once.call_once(|| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(once.is_completed());
    }
}
