//! ABI layer for `tss_*` (thread-specific storage).

use std::ffi::{c_int, c_void};
use std::ptr;
use std::sync::Arc;

use syncshim_core::TssKey;
use syncshim_core::threads::tss;

use crate::types::{THRD_ERROR, THRD_SUCCESS, tss_dtor_t, tss_t};
use crate::util::code;

fn key_from(raw: tss_t) -> Option<TssKey> {
    (raw != 0).then(|| TssKey::from_raw(raw))
}

shim_fn! {
    /// C11 `tss_create`. `THRD_NOMEM` once `TSS_KEYS_MAX` keys are live.
    fn shim_tss_create(key: *mut tss_t, dtor: Option<tss_dtor_t>) -> c_int {
        if key.is_null() {
            return THRD_ERROR;
        }
        let destructor: Option<tss::TssDestructor> = dtor.map(|dtor| {
            Arc::new(move |value: usize| {
                // SAFETY: the key's creator supplied `dtor` for exactly
                // these values.
                unsafe { dtor(value as *mut c_void) }
            }) as tss::TssDestructor
        });
        match tss::create(destructor) {
            Ok(created) => {
                // SAFETY: `key` was validated non-null above.
                unsafe { *key = created.to_raw() };
                THRD_SUCCESS
            }
            Err(err) => err.code(),
        }
    }
}

shim_fn! {
    /// C11 `tss_delete`, returning a code. Stored values are not destroyed.
    fn shim_tss_delete(key: tss_t) -> c_int {
        match key_from(key) {
            Some(key) => code(tss::delete(key)),
            None => THRD_ERROR,
        }
    }
}

/// C11 `tss_get`: null for unset values and invalid keys.
#[unsafe(no_mangle)]
pub extern "C" fn shim_tss_get(key: tss_t) -> *mut c_void {
    match key_from(key) {
        Some(key) => tss::get(key) as *mut c_void,
        None => ptr::null_mut(),
    }
}

shim_fn! {
    /// C11 `tss_set`.
    fn shim_tss_set(key: tss_t, value: *mut c_void) -> c_int {
        match key_from(key) {
            Some(key) => code(tss::set(key, value as usize)),
            None => THRD_ERROR,
        }
    }
}
