//! ABI layer for `mtx_*`.

use std::ffi::c_int;
use std::ptr;

use syncshim_core::{Condvar, Mutex, MutexKind, RecursiveMutex, SyncResult, Timespec};

use crate::types::{THRD_ERROR, THRD_SUCCESS, mtx_t, shim_timespec};
use crate::util::{borrow, code, install, read_timespec, release};

/// Heap object behind an `mtx_t`.
pub(crate) enum MutexSlot {
    Plain(Mutex),
    Recursive(RecursiveMutex),
}

impl MutexSlot {
    fn new(kind: MutexKind) -> Self {
        if kind.recursive {
            Self::Recursive(RecursiveMutex::new())
        } else {
            Self::Plain(Mutex::new())
        }
    }

    fn lock(&self) -> SyncResult {
        match self {
            Self::Plain(m) => m.lock(),
            Self::Recursive(m) => m.lock(),
        }
    }

    fn try_lock(&self) -> SyncResult {
        match self {
            Self::Plain(m) => m.try_lock(),
            Self::Recursive(m) => m.try_lock(),
        }
    }

    fn timed_lock(&self, deadline: &Timespec) -> SyncResult {
        match self {
            Self::Plain(m) => m.timed_lock(deadline),
            Self::Recursive(m) => m.timed_lock(deadline),
        }
    }

    fn unlock(&self) -> SyncResult {
        match self {
            Self::Plain(m) => m.unlock(),
            Self::Recursive(m) => m.unlock(),
        }
    }

    fn check_destroy(&self) -> SyncResult {
        match self {
            Self::Plain(m) => m.check_destroy(),
            Self::Recursive(m) => m.check_destroy(),
        }
    }

    pub(crate) fn cond_wait(&self, cv: &Condvar) -> SyncResult {
        match self {
            Self::Plain(m) => cv.wait(m),
            Self::Recursive(m) => cv.wait(m),
        }
    }

    pub(crate) fn cond_timed_wait(&self, cv: &Condvar, deadline: &Timespec) -> SyncResult {
        match self {
            Self::Plain(m) => cv.timed_wait(m, deadline),
            Self::Recursive(m) => cv.timed_wait(m, deadline),
        }
    }
}

/// Resolve an `mtx_t*` to its live object.
///
/// # Safety
///
/// `mtx` must be null or point to an `mtx_t` that is uninitialized (null
/// handle) or initialized by [`shim_mtx_init`].
pub(crate) unsafe fn mutex_slot<'a>(mtx: *mut mtx_t) -> Option<&'a MutexSlot> {
    // SAFETY: null-checked; caller guarantees the pointee otherwise.
    let handle = unsafe { mtx.as_ref() }?.handle;
    // SAFETY: non-null handles are only ever produced by `install::<MutexSlot>`.
    unsafe { borrow::<MutexSlot>(handle) }
}

shim_fn! {
    /// C11 `mtx_init`. `kind` is `mtx_plain` or `mtx_timed`, optionally
    /// or'd with `mtx_recursive`.
    fn shim_mtx_init(mtx: *mut mtx_t, kind: c_int) -> c_int {
        if mtx.is_null() {
            return THRD_ERROR;
        }
        let kind = match MutexKind::from_flags(kind) {
            Ok(kind) => kind,
            Err(err) => return err.code(),
        };
        // SAFETY: `mtx` is non-null and writable per the C contract.
        unsafe { (*mtx).handle = install(MutexSlot::new(kind)) };
        THRD_SUCCESS
    }
}

shim_fn! {
    /// C11 `mtx_lock`. Relocking a held plain mutex is `THRD_ERROR`.
    fn shim_mtx_lock(mtx: *mut mtx_t) -> c_int {
        match unsafe { mutex_slot(mtx) } {
            Some(slot) => code(slot.lock()),
            None => THRD_ERROR,
        }
    }
}

shim_fn! {
    /// C11 `mtx_trylock`: `THRD_BUSY` when held.
    fn shim_mtx_trylock(mtx: *mut mtx_t) -> c_int {
        match unsafe { mutex_slot(mtx) } {
            Some(slot) => code(slot.try_lock()),
            None => THRD_ERROR,
        }
    }
}

shim_fn! {
    /// C11 `mtx_timedlock` with an absolute `TIME_UTC` deadline.
    fn shim_mtx_timedlock(mtx: *mut mtx_t, deadline: *const shim_timespec) -> c_int {
        let Some(slot) = (unsafe { mutex_slot(mtx) }) else {
            return THRD_ERROR;
        };
        let Some(deadline) = (unsafe { read_timespec(deadline) }) else {
            return THRD_ERROR;
        };
        code(slot.timed_lock(&deadline))
    }
}

shim_fn! {
    /// C11 `mtx_unlock`. `THRD_ERROR` unless the caller holds it.
    fn shim_mtx_unlock(mtx: *mut mtx_t) -> c_int {
        match unsafe { mutex_slot(mtx) } {
            Some(slot) => code(slot.unlock()),
            None => THRD_ERROR,
        }
    }
}

shim_fn! {
    /// C11 `mtx_destroy`, returning a code. `THRD_BUSY` while held.
    fn shim_mtx_destroy(mtx: *mut mtx_t) -> c_int {
        let Some(slot) = (unsafe { mutex_slot(mtx) }) else {
            return THRD_ERROR;
        };
        if let Err(err) = slot.check_destroy() {
            return err.code();
        }
        // SAFETY: `mutex_slot` proved both pointers live; the handle is
        // cleared so it cannot be released twice.
        unsafe {
            let handle = (*mtx).handle;
            (*mtx).handle = ptr::null_mut();
            release::<MutexSlot>(handle);
        }
        THRD_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{THRD_BUSY, mtx_plain, mtx_recursive, mtx_timed};

    #[test]
    fn init_rejects_bad_kinds() {
        let mut m = mtx_t::new();
        unsafe {
            assert_eq!(shim_mtx_init(&mut m, 0), THRD_ERROR);
            assert_eq!(shim_mtx_init(&mut m, mtx_recursive), THRD_ERROR);
            assert_eq!(shim_mtx_init(&mut m, 0x40 | mtx_plain), THRD_ERROR);
        }
        assert!(!m.is_initialized());
    }

    #[test]
    fn lifecycle_nulls_handle() {
        let mut m = mtx_t::new();
        unsafe {
            assert_eq!(shim_mtx_init(&mut m, mtx_timed), THRD_SUCCESS);
            assert!(m.is_initialized());
            assert_eq!(shim_mtx_lock(&mut m), THRD_SUCCESS);
            assert_eq!(shim_mtx_destroy(&mut m), THRD_BUSY);
            assert_eq!(shim_mtx_unlock(&mut m), THRD_SUCCESS);
            assert_eq!(shim_mtx_destroy(&mut m), THRD_SUCCESS);
            assert!(!m.is_initialized());
            assert_eq!(shim_mtx_destroy(&mut m), THRD_ERROR);
            assert_eq!(shim_mtx_lock(&mut m), THRD_ERROR);
        }
    }

    #[test]
    fn recursive_kind_relocks() {
        let mut m = mtx_t::new();
        unsafe {
            assert_eq!(shim_mtx_init(&mut m, mtx_plain | mtx_recursive), THRD_SUCCESS);
            assert_eq!(shim_mtx_lock(&mut m), THRD_SUCCESS);
            assert_eq!(shim_mtx_trylock(&mut m), THRD_SUCCESS);
            assert_eq!(shim_mtx_unlock(&mut m), THRD_SUCCESS);
            assert_eq!(shim_mtx_unlock(&mut m), THRD_SUCCESS);
            assert_eq!(shim_mtx_unlock(&mut m), THRD_ERROR);
            assert_eq!(shim_mtx_destroy(&mut m), THRD_SUCCESS);
        }
    }

    #[test]
    fn timedlock_rejects_unnormalized_deadline() {
        let mut m = mtx_t::new();
        let bad = shim_timespec {
            tv_sec: 0,
            tv_nsec: 1_000_000_000,
        };
        unsafe {
            assert_eq!(shim_mtx_init(&mut m, mtx_timed), THRD_SUCCESS);
            assert_eq!(shim_mtx_timedlock(&mut m, &bad), THRD_ERROR);
            assert_eq!(shim_mtx_destroy(&mut m), THRD_SUCCESS);
        }
    }
}
