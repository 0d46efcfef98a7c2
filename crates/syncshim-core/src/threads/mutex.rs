//! Plain and recursive mutexes.
//!
//! Ownership is tracked per thread id:
//! - `lock`/`timed_lock` by the holder of a plain mutex fails with `Error`
//!   instead of deadlocking; `try_lock` by the holder reports `Busy`.
//! - `unlock` by anyone but the holder fails with `Error`.
//! - A held mutex cannot be destroyed (`Busy`).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use super::NO_OWNER;
use super::cond::sealed;
use super::thread;
use crate::status::{SyncError, SyncResult};
use crate::sys::{RawLock, RawLockOps};
use crate::time::{Timespec, until_deadline};

// ---------------------------------------------------------------------------
// Type flags (C11 `mtx_*`)
// ---------------------------------------------------------------------------

pub const MTX_PLAIN: i32 = 1;
pub const MTX_TIMED: i32 = 2;
pub const MTX_RECURSIVE: i32 = 4;

/// Decoded mutex type flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutexKind {
    pub timed: bool,
    pub recursive: bool,
}

impl MutexKind {
    pub const PLAIN: Self = Self {
        timed: false,
        recursive: false,
    };
    pub const RECURSIVE: Self = Self {
        timed: false,
        recursive: true,
    };

    /// Accepts exactly one of `MTX_PLAIN`/`MTX_TIMED`, optionally or'd with
    /// `MTX_RECURSIVE`. Anything else is `Error`.
    pub const fn from_flags(flags: i32) -> SyncResult<Self> {
        if flags & !(MTX_PLAIN | MTX_TIMED | MTX_RECURSIVE) != 0 {
            return Err(SyncError::Error);
        }
        let plain = flags & MTX_PLAIN != 0;
        let timed = flags & MTX_TIMED != 0;
        if plain == timed {
            return Err(SyncError::Error);
        }
        Ok(Self {
            timed,
            recursive: flags & MTX_RECURSIVE != 0,
        })
    }
}

// ---------------------------------------------------------------------------
// Plain mutex
// ---------------------------------------------------------------------------

/// Non-recursive mutex.
///
/// The owner word is written only by the thread that holds the lock, so a
/// relaxed load equal to the caller's id proves the caller holds it.
pub struct Mutex {
    raw: RawLock,
    owner: AtomicU64,
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: RawLock::new(),
            owner: AtomicU64::new(NO_OWNER),
        }
    }

    fn held_by(&self, me: u64) -> bool {
        self.owner.load(Ordering::Relaxed) == me
    }

    pub fn lock(&self) -> SyncResult {
        let me = thread::current_raw();
        if self.held_by(me) {
            return Err(SyncError::Error);
        }
        self.raw.lock();
        self.owner.store(me, Ordering::Relaxed);
        Ok(())
    }

    pub fn try_lock(&self) -> SyncResult {
        if !self.raw.try_lock() {
            return Err(SyncError::Busy);
        }
        self.owner.store(thread::current_raw(), Ordering::Relaxed);
        Ok(())
    }

    /// Block until acquired or the absolute realtime `deadline` passes.
    pub fn timed_lock(&self, deadline: &Timespec) -> SyncResult {
        let me = thread::current_raw();
        if self.held_by(me) {
            return Err(SyncError::Error);
        }
        until_deadline(deadline, |at| self.raw.try_lock_until(at).then_some(()))?;
        self.owner.store(me, Ordering::Relaxed);
        Ok(())
    }

    pub fn unlock(&self) -> SyncResult {
        if !self.held_by(thread::current_raw()) {
            return Err(SyncError::Error);
        }
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.raw.unlock();
        Ok(())
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    #[must_use]
    pub fn is_held_by_current_thread(&self) -> bool {
        self.held_by(thread::current_raw())
    }

    /// `Busy` while held; destroying then would strand the holder.
    pub fn check_destroy(&self) -> SyncResult {
        if self.raw.is_locked() {
            Err(SyncError::Busy)
        } else {
            Ok(())
        }
    }
}

impl sealed::Sealed for Mutex {
    fn raw_lock(&self) -> &RawLock {
        &self.raw
    }

    fn begin_wait(&self) -> SyncResult<u32> {
        if !self.is_held_by_current_thread() {
            return Err(SyncError::Error);
        }
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        Ok(1)
    }

    fn end_wait(&self, _depth: u32) {
        self.owner.store(thread::current_raw(), Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Recursive mutex
// ---------------------------------------------------------------------------

/// Mutex the holder may relock; released when the hold count returns to 0.
pub struct RecursiveMutex {
    raw: RawLock,
    owner: AtomicU64,
    // only touched by the holder
    depth: AtomicU32,
}

impl Default for RecursiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl RecursiveMutex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: RawLock::new(),
            owner: AtomicU64::new(NO_OWNER),
            depth: AtomicU32::new(0),
        }
    }

    fn held_by(&self, me: u64) -> bool {
        self.owner.load(Ordering::Relaxed) == me
    }

    fn relock(&self) -> SyncResult {
        let depth = self.depth.load(Ordering::Relaxed);
        let next = depth.checked_add(1).ok_or(SyncError::Error)?;
        self.depth.store(next, Ordering::Relaxed);
        Ok(())
    }

    fn take(&self, me: u64) {
        self.owner.store(me, Ordering::Relaxed);
        self.depth.store(1, Ordering::Relaxed);
    }

    pub fn lock(&self) -> SyncResult {
        let me = thread::current_raw();
        if self.held_by(me) {
            return self.relock();
        }
        self.raw.lock();
        self.take(me);
        Ok(())
    }

    /// Always succeeds for the holder.
    pub fn try_lock(&self) -> SyncResult {
        let me = thread::current_raw();
        if self.held_by(me) {
            return self.relock();
        }
        if !self.raw.try_lock() {
            return Err(SyncError::Busy);
        }
        self.take(me);
        Ok(())
    }

    pub fn timed_lock(&self, deadline: &Timespec) -> SyncResult {
        let me = thread::current_raw();
        if self.held_by(me) {
            return self.relock();
        }
        until_deadline(deadline, |at| self.raw.try_lock_until(at).then_some(()))?;
        self.take(me);
        Ok(())
    }

    pub fn unlock(&self) -> SyncResult {
        if !self.held_by(thread::current_raw()) {
            return Err(SyncError::Error);
        }
        let depth = self.depth.load(Ordering::Relaxed).saturating_sub(1);
        self.depth.store(depth, Ordering::Relaxed);
        if depth == 0 {
            self.owner.store(NO_OWNER, Ordering::Relaxed);
            self.raw.unlock();
        }
        Ok(())
    }

    /// Holds taken by the calling thread (0 when it is not the holder).
    #[must_use]
    pub fn hold_count(&self) -> u32 {
        if self.held_by(thread::current_raw()) {
            self.depth.load(Ordering::Relaxed)
        } else {
            0
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    pub fn check_destroy(&self) -> SyncResult {
        if self.raw.is_locked() {
            Err(SyncError::Busy)
        } else {
            Ok(())
        }
    }
}

impl sealed::Sealed for RecursiveMutex {
    fn raw_lock(&self) -> &RawLock {
        &self.raw
    }

    /// Waiting releases the lock fully, which is only sound at depth 1.
    fn begin_wait(&self) -> SyncResult<u32> {
        if self.hold_count() != 1 {
            return Err(SyncError::Error);
        }
        self.owner.store(NO_OWNER, Ordering::Relaxed);
        self.depth.store(0, Ordering::Relaxed);
        Ok(1)
    }

    fn end_wait(&self, depth: u32) {
        self.owner.store(thread::current_raw(), Ordering::Relaxed);
        self.depth.store(depth, Ordering::Relaxed);
    }
}
