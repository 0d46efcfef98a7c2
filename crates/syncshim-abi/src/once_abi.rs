//! ABI layer for `call_once`.

use std::ffi::c_int;

use crate::types::{THRD_ERROR, THRD_SUCCESS, once_flag};

shim_fn! {
    /// C11 `call_once`, returning a code. Exactly one caller per flag runs
    /// `func`; every caller returns after it has finished.
    fn shim_call_once(flag: *mut once_flag, func: Option<unsafe extern "C" fn()>) -> c_int {
        let (Some(flag), Some(func)) = (unsafe { flag.as_ref() }, func) else {
            return THRD_ERROR;
        };
        flag.inner.call_once(|| {
            // SAFETY: the caller supplies a valid initializer.
            unsafe { func() }
        });
        THRD_SUCCESS
    }
}
