//! Read-write lock with a single mode-inferring `unlock`.
//!
//! The writer is tracked by thread id; readers only by count. `unlock`
//! releases the write lock when the caller is the writer and otherwise drops
//! one shared hold, so a thread that never took a read lock can still
//! release someone else's while readers are active.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::NO_OWNER;
use super::thread;
use crate::status::{SyncError, SyncResult};
use crate::sys::{RawRwLock, RawRwLockOps};
use crate::time::{Timespec, until_deadline};

pub struct RwLock {
    raw: RawRwLock,
    writer: AtomicU64,
    readers: AtomicUsize,
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl RwLock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raw: RawRwLock::new(),
            writer: AtomicU64::new(NO_OWNER),
            readers: AtomicUsize::new(0),
        }
    }

    fn written_by(&self, me: u64) -> bool {
        self.writer.load(Ordering::Relaxed) == me
    }

    fn enter_read(&self) {
        self.readers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn read(&self) -> SyncResult {
        if self.written_by(thread::current_raw()) {
            return Err(SyncError::Error);
        }
        self.raw.read();
        self.enter_read();
        Ok(())
    }

    pub fn try_read(&self) -> SyncResult {
        if !self.raw.try_read() {
            return Err(SyncError::Busy);
        }
        self.enter_read();
        Ok(())
    }

    pub fn timed_read(&self, deadline: &Timespec) -> SyncResult {
        if self.written_by(thread::current_raw()) {
            return Err(SyncError::Error);
        }
        until_deadline(deadline, |at| self.raw.try_read_until(at).then_some(()))?;
        self.enter_read();
        Ok(())
    }

    pub fn write(&self) -> SyncResult {
        let me = thread::current_raw();
        if self.written_by(me) {
            return Err(SyncError::Error);
        }
        self.raw.write();
        self.writer.store(me, Ordering::Relaxed);
        Ok(())
    }

    pub fn try_write(&self) -> SyncResult {
        if !self.raw.try_write() {
            return Err(SyncError::Busy);
        }
        self.writer.store(thread::current_raw(), Ordering::Relaxed);
        Ok(())
    }

    pub fn timed_write(&self, deadline: &Timespec) -> SyncResult {
        let me = thread::current_raw();
        if self.written_by(me) {
            return Err(SyncError::Error);
        }
        until_deadline(deadline, |at| self.raw.try_write_until(at).then_some(()))?;
        self.writer.store(me, Ordering::Relaxed);
        Ok(())
    }

    /// Release whichever mode is held. `Error` when nothing is held.
    pub fn unlock(&self) -> SyncResult {
        if self.written_by(thread::current_raw()) {
            self.writer.store(NO_OWNER, Ordering::Relaxed);
            self.raw.unlock_write();
            return Ok(());
        }
        match self
            .readers
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
        {
            Ok(_) => {
                self.raw.unlock_read();
                Ok(())
            }
            Err(_) => Err(SyncError::Error),
        }
    }

    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_write_locked(&self) -> bool {
        self.writer.load(Ordering::Relaxed) != NO_OWNER
    }

    /// `Busy` while any reader or the writer holds it, including one that
    /// has acquired but not yet recorded its hold.
    pub fn check_destroy(&self) -> SyncResult {
        if self.raw.is_locked() || self.is_write_locked() || self.reader_count() > 0 {
            Err(SyncError::Busy)
        } else {
            Ok(())
        }
    }
}
