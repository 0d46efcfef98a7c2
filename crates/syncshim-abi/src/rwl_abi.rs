//! ABI layer for `rwl_*` (read-write locks).

use std::ffi::c_int;
use std::ptr;

use syncshim_core::{RwLock, SyncResult, Timespec};

use crate::types::{THRD_ERROR, THRD_SUCCESS, rwl_t, shim_timespec};
use crate::util::{borrow, code, install, read_timespec, release};

/// # Safety
///
/// `rwl` must be null or point to an uninitialized or live `rwl_t`.
unsafe fn rwlock<'a>(rwl: *mut rwl_t) -> Option<&'a RwLock> {
    // SAFETY: null-checked; handles come from `install::<RwLock>`.
    unsafe { borrow::<RwLock>(rwl.as_ref()?.handle) }
}

/// # Safety
///
/// As [`rwlock`].
unsafe fn with_rwlock(rwl: *mut rwl_t, op: impl FnOnce(&RwLock) -> SyncResult) -> c_int {
    match unsafe { rwlock(rwl) } {
        Some(lock) => code(op(lock)),
        None => THRD_ERROR,
    }
}

/// # Safety
///
/// As [`rwlock`]; `deadline` must be null or readable.
unsafe fn with_rwlock_deadline(
    rwl: *mut rwl_t,
    deadline: *const shim_timespec,
    op: impl FnOnce(&RwLock, &Timespec) -> SyncResult,
) -> c_int {
    let (Some(lock), Some(deadline)) = (unsafe { rwlock(rwl) }, unsafe { read_timespec(deadline) })
    else {
        return THRD_ERROR;
    };
    code(op(lock, &deadline))
}

shim_fn! {
    fn shim_rwl_init(rwl: *mut rwl_t) -> c_int {
        if rwl.is_null() {
            return THRD_ERROR;
        }
        // SAFETY: non-null and writable per the C contract.
        unsafe { (*rwl).handle = install(RwLock::new()) };
        THRD_SUCCESS
    }
}

shim_fn! {
    fn shim_rwl_rdlock(rwl: *mut rwl_t) -> c_int {
        with_rwlock(rwl, RwLock::read)
    }
}

shim_fn! {
    fn shim_rwl_wrlock(rwl: *mut rwl_t) -> c_int {
        with_rwlock(rwl, RwLock::write)
    }
}

shim_fn! {
    /// `THRD_BUSY` while a writer holds or waits for it.
    fn shim_rwl_tryrdlock(rwl: *mut rwl_t) -> c_int {
        with_rwlock(rwl, RwLock::try_read)
    }
}

shim_fn! {
    /// `THRD_BUSY` while any reader or writer holds it.
    fn shim_rwl_trywrlock(rwl: *mut rwl_t) -> c_int {
        with_rwlock(rwl, RwLock::try_write)
    }
}

shim_fn! {
    fn shim_rwl_timedrdlock(rwl: *mut rwl_t, deadline: *const shim_timespec) -> c_int {
        with_rwlock_deadline(rwl, deadline, RwLock::timed_read)
    }
}

shim_fn! {
    fn shim_rwl_timedwrlock(rwl: *mut rwl_t, deadline: *const shim_timespec) -> c_int {
        with_rwlock_deadline(rwl, deadline, RwLock::timed_write)
    }
}

shim_fn! {
    /// Releases the write lock if the caller is the writer, else one read hold.
    fn shim_rwl_unlock(rwl: *mut rwl_t) -> c_int {
        with_rwlock(rwl, RwLock::unlock)
    }
}

shim_fn! {
    /// `THRD_BUSY` while held in either mode.
    fn shim_rwl_destroy(rwl: *mut rwl_t) -> c_int {
        let Some(lock) = (unsafe { rwlock(rwl) }) else {
            return THRD_ERROR;
        };
        if let Err(err) = lock.check_destroy() {
            return err.code();
        }
        // SAFETY: live handle; cleared before release.
        unsafe {
            let handle = (*rwl).handle;
            (*rwl).handle = ptr::null_mut();
            release::<RwLock>(handle);
        }
        THRD_SUCCESS
    }
}
