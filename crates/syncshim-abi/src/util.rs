//! Shared internal utilities for ABI adapters.

use std::ffi::{c_int, c_void};

use syncshim_core::{SyncResult, Timespec, result_code};

use crate::types::shim_timespec;

/// Move `value` to the heap and return it as an opaque handle.
pub(crate) fn install<T>(value: T) -> *mut c_void {
    Box::into_raw(Box::new(value)).cast()
}

/// Borrow the object behind a handle.
///
/// # Safety
///
/// `handle` must be null or come from [`install::<T>`] and not yet be
/// released.
pub(crate) unsafe fn borrow<'a, T>(handle: *mut c_void) -> Option<&'a T> {
    // SAFETY: per the contract above, a non-null handle points to a live T.
    unsafe { handle.cast::<T>().as_ref() }
}

/// Free the object behind a handle.
///
/// # Safety
///
/// `handle` must come from [`install::<T>`], be released once, and have no
/// borrows outstanding.
pub(crate) unsafe fn release<T>(handle: *mut c_void) {
    // SAFETY: see above.
    drop(unsafe { Box::from_raw(handle.cast::<T>()) });
}

/// Read a caller-supplied timespec. `None` for null or unnormalized input.
///
/// # Safety
///
/// `ptr` must be null or valid for reads.
pub(crate) unsafe fn read_timespec(ptr: *const shim_timespec) -> Option<Timespec> {
    // SAFETY: null-checked by `as_ref`; caller guarantees validity otherwise.
    unsafe { ptr.as_ref() }.and_then(|ts| ts.to_core())
}

/// Store into an optional out-pointer.
///
/// # Safety
///
/// `ptr` must be null or valid for writes.
pub(crate) unsafe fn write_opt<T>(ptr: *mut T, value: T) {
    if !ptr.is_null() {
        // SAFETY: non-null and writable per the caller.
        unsafe { ptr.write(value) };
    }
}

pub(crate) fn code<T>(result: SyncResult<T>) -> c_int {
    result_code(&result)
}
