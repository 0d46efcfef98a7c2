//! ABI layer for the time base: `timespec_get` and deadline helpers.

use std::ffi::c_int;
use std::time::Duration;

use syncshim_core::time::{self, Clock};

use crate::types::{THRD_ERROR, THRD_SUCCESS, shim_timespec};
use crate::util::read_timespec;

/// C11 `timespec_get`: returns `base` on success, 0 on a null `ts` or an
/// unknown base.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shim_timespec_get(ts: *mut shim_timespec, base: c_int) -> c_int {
    if ts.is_null() {
        return 0;
    }
    let Some(now) = Clock::from_base(base).and_then(|clock| time::now(clock).ok()) else {
        return 0;
    };
    // SAFETY: non-null and writable per the C contract.
    unsafe { *ts = shim_timespec::from_core(now) };
    base
}

shim_fn! {
    /// Read clock `base` (`TIME_UTC` or `TIME_MONOTONIC`) into `ts`.
    fn shim_clock_now(base: c_int, ts: *mut shim_timespec) -> c_int {
        if ts.is_null() {
            return THRD_ERROR;
        }
        let Some(clock) = Clock::from_base(base) else {
            return THRD_ERROR;
        };
        match time::now(clock) {
            Ok(now) => {
                // SAFETY: non-null and writable per the C contract.
                unsafe { *ts = shim_timespec::from_core(now) };
                THRD_SUCCESS
            }
            Err(err) => err.code(),
        }
    }
}

shim_fn! {
    /// `out = a + b`, saturating.
    fn shim_timespec_add(
        a: *const shim_timespec,
        b: *const shim_timespec,
        out: *mut shim_timespec,
    ) -> c_int {
        let (Some(a), Some(b)) = (unsafe { read_timespec(a) }, unsafe { read_timespec(b) }) else {
            return THRD_ERROR;
        };
        if out.is_null() {
            return THRD_ERROR;
        }
        // SAFETY: non-null and writable per the C contract.
        unsafe { *out = shim_timespec::from_core(a.add(b)) };
        THRD_SUCCESS
    }
}

shim_fn! {
    /// `out = a - b`, clamped at zero.
    fn shim_timespec_sub(
        a: *const shim_timespec,
        b: *const shim_timespec,
        out: *mut shim_timespec,
    ) -> c_int {
        let (Some(a), Some(b)) = (unsafe { read_timespec(a) }, unsafe { read_timespec(b) }) else {
            return THRD_ERROR;
        };
        if out.is_null() {
            return THRD_ERROR;
        }
        // SAFETY: non-null and writable per the C contract.
        unsafe { *out = shim_timespec::from_core(a.sub(b)) };
        THRD_SUCCESS
    }
}

shim_fn! {
    /// Store -1, 0 or 1 in `out` as `a` is before, equal to or after `b`.
    fn shim_timespec_cmp(
        a: *const shim_timespec,
        b: *const shim_timespec,
        out: *mut c_int,
    ) -> c_int {
        let (Some(a), Some(b)) = (unsafe { read_timespec(a) }, unsafe { read_timespec(b) }) else {
            return THRD_ERROR;
        };
        if out.is_null() {
            return THRD_ERROR;
        }
        // SAFETY: non-null and writable per the C contract.
        unsafe { *out = a.cmp(&b) as c_int };
        THRD_SUCCESS
    }
}

shim_fn! {
    /// Absolute `TIME_UTC` deadline `millis` from now.
    fn shim_deadline_after_ms(millis: i64, out: *mut shim_timespec) -> c_int {
        let Ok(millis) = u64::try_from(millis) else {
            return THRD_ERROR;
        };
        if out.is_null() {
            return THRD_ERROR;
        }
        let deadline = time::deadline_after(Duration::from_millis(millis));
        // SAFETY: non-null and writable per the C contract.
        unsafe { *out = shim_timespec::from_core(deadline) };
        THRD_SUCCESS
    }
}
