//! ABI layer for `thrd_*`.

use std::ffi::{c_int, c_void};

use syncshim_core::ThreadId;
use syncshim_core::threads::SleepOutcome;
use syncshim_core::threads::thread;

use crate::types::{THRD_ERROR, THRD_SUCCESS, shim_timespec, thrd_start_t, thrd_t};
use crate::util::{code, read_timespec, write_opt};

shim_fn! {
    /// C11 `thrd_create`. `THRD_NOMEM` when the platform refuses the thread.
    fn shim_thrd_create(thr: *mut thrd_t, func: Option<thrd_start_t>, arg: *mut c_void) -> c_int {
        let Some(func) = func else {
            return THRD_ERROR;
        };
        if thr.is_null() {
            return THRD_ERROR;
        }
        let arg_addr = arg as usize;
        let spawned = thread::spawn(move || {
            // SAFETY: thrd_create contract supplies a valid start routine
            // and an argument it understands.
            let result = unsafe { func(arg_addr as *mut c_void) };
            result as isize
        });
        match spawned {
            Ok(id) => {
                // SAFETY: `thr` was validated non-null above.
                unsafe { *thr = id.as_raw() };
                THRD_SUCCESS
            }
            Err(err) => err.code(),
        }
    }
}

shim_fn! {
    /// C11 `thrd_join`. Stores the start routine's result in `res` when
    /// non-null. Joining twice, a detached thread, or oneself is `THRD_ERROR`.
    fn shim_thrd_join(thr: thrd_t, res: *mut c_int) -> c_int {
        let Some(id) = ThreadId::from_raw(thr) else {
            return THRD_ERROR;
        };
        match thread::join(id) {
            Ok(value) => {
                // SAFETY: caller-provided output pointer.
                unsafe { write_opt(res, value as c_int) };
                THRD_SUCCESS
            }
            Err(err) => err.code(),
        }
    }
}

shim_fn! {
    /// C11 `thrd_detach`.
    fn shim_thrd_detach(thr: thrd_t) -> c_int {
        match ThreadId::from_raw(thr) {
            Some(id) => code(thread::detach(id)),
            None => THRD_ERROR,
        }
    }
}

/// C11 `thrd_current`. Never 0.
#[unsafe(no_mangle)]
pub extern "C" fn shim_thrd_current() -> thrd_t {
    thread::current().as_raw()
}

/// C11 `thrd_equal`: non-zero when `a` and `b` name the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn shim_thrd_equal(a: thrd_t, b: thrd_t) -> c_int {
    c_int::from(a == b)
}

/// C11 `thrd_yield`.
#[unsafe(no_mangle)]
pub extern "C" fn shim_thrd_yield() {
    thread::yield_now();
}

shim_fn! {
    /// C11 `thrd_sleep`. An interrupted sleep stores the unslept time in
    /// `remaining` (when non-null) and returns `THRD_ERROR`; a completed one
    /// zeroes it.
    fn shim_thrd_sleep(duration: *const shim_timespec, remaining: *mut shim_timespec) -> c_int {
        let Some(span) = (unsafe { read_timespec(duration) }) else {
            return THRD_ERROR;
        };
        match thread::sleep(span) {
            Ok(SleepOutcome::Completed) => {
                // SAFETY: caller-provided output pointer.
                unsafe { write_opt(remaining, shim_timespec::default()) };
                THRD_SUCCESS
            }
            Ok(SleepOutcome::Interrupted { remaining: left }) => {
                // SAFETY: caller-provided output pointer.
                unsafe { write_opt(remaining, shim_timespec::from_core(left)) };
                THRD_ERROR
            }
            Err(err) => err.code(),
        }
    }
}

/// C11 `thrd_exit`.
///
/// On a shim thread, unwinds to the thread entry, runs TSS destructors and
/// hands `res` to the joiner. Every frame between here and the start routine
/// must permit unwinding (`extern "C-unwind"`). On any other thread the
/// process exits with status `res`.
#[unsafe(no_mangle)]
pub extern "C-unwind" fn shim_thrd_exit(res: c_int) -> ! {
    thread::exit(res as isize)
}
