//! ABI layer for `cnd_*`.

use std::ffi::c_int;
use std::ptr;

use syncshim_core::Condvar;

use crate::mtx_abi::mutex_slot;
use crate::types::{THRD_ERROR, THRD_SUCCESS, cnd_t, mtx_t, shim_timespec};
use crate::util::{borrow, code, install, read_timespec, release};

/// # Safety
///
/// `cond` must be null or point to an uninitialized or live `cnd_t`.
unsafe fn condvar<'a>(cond: *mut cnd_t) -> Option<&'a Condvar> {
    // SAFETY: null-checked; handles come from `install::<Condvar>`.
    unsafe { borrow::<Condvar>(cond.as_ref()?.handle) }
}

shim_fn! {
    /// C11 `cnd_init`.
    fn shim_cnd_init(cond: *mut cnd_t) -> c_int {
        if cond.is_null() {
            return THRD_ERROR;
        }
        // SAFETY: non-null and writable per the C contract.
        unsafe { (*cond).handle = install(Condvar::new()) };
        THRD_SUCCESS
    }
}

shim_fn! {
    /// C11 `cnd_signal`; a no-op without waiters.
    fn shim_cnd_signal(cond: *mut cnd_t) -> c_int {
        match unsafe { condvar(cond) } {
            Some(cv) => code(cv.signal()),
            None => THRD_ERROR,
        }
    }
}

shim_fn! {
    /// C11 `cnd_broadcast`.
    fn shim_cnd_broadcast(cond: *mut cnd_t) -> c_int {
        match unsafe { condvar(cond) } {
            Some(cv) => code(cv.broadcast()),
            None => THRD_ERROR,
        }
    }
}

shim_fn! {
    /// C11 `cnd_wait`. The caller must hold `mtx`.
    fn shim_cnd_wait(cond: *mut cnd_t, mtx: *mut mtx_t) -> c_int {
        let (Some(cv), Some(slot)) = (unsafe { condvar(cond) }, unsafe { mutex_slot(mtx) }) else {
            return THRD_ERROR;
        };
        code(slot.cond_wait(cv))
    }
}

shim_fn! {
    /// C11 `cnd_timedwait`: `THRD_TIMEDOUT` with `mtx` held again once the
    /// absolute `TIME_UTC` deadline passes.
    fn shim_cnd_timedwait(
        cond: *mut cnd_t,
        mtx: *mut mtx_t,
        deadline: *const shim_timespec,
    ) -> c_int {
        let (Some(cv), Some(slot)) = (unsafe { condvar(cond) }, unsafe { mutex_slot(mtx) }) else {
            return THRD_ERROR;
        };
        let Some(deadline) = (unsafe { read_timespec(deadline) }) else {
            return THRD_ERROR;
        };
        code(slot.cond_timed_wait(cv, &deadline))
    }
}

shim_fn! {
    /// C11 `cnd_destroy`, returning a code. `THRD_BUSY` while threads wait.
    fn shim_cnd_destroy(cond: *mut cnd_t) -> c_int {
        let Some(cv) = (unsafe { condvar(cond) }) else {
            return THRD_ERROR;
        };
        if let Err(err) = cv.check_destroy() {
            return err.code();
        }
        // SAFETY: live handle; cleared before release.
        unsafe {
            let handle = (*cond).handle;
            (*cond).handle = ptr::null_mut();
            release::<Condvar>(handle);
        }
        THRD_SUCCESS
    }
}
