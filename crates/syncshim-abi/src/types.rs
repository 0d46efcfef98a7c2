//! C-visible types and constants.

use std::ffi::{c_int, c_void};
use std::ptr;

use syncshim_core::threads::mutex::{MTX_PLAIN, MTX_RECURSIVE, MTX_TIMED};
use syncshim_core::{OnceFlag, Timespec};

pub use syncshim_core::status::{THRD_BUSY, THRD_ERROR, THRD_NOMEM, THRD_SUCCESS, THRD_TIMEDOUT};
pub use syncshim_core::threads::tss::{TSS_DTOR_ITERATIONS, TSS_KEYS_MAX};
pub use syncshim_core::time::{TIME_MONOTONIC, TIME_UTC};

pub const mtx_plain: c_int = MTX_PLAIN;
pub const mtx_timed: c_int = MTX_TIMED;
pub const mtx_recursive: c_int = MTX_RECURSIVE;

/// `struct shim_timespec { int64_t tv_sec; int64_t tv_nsec; }`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct shim_timespec {
    pub tv_sec: i64,
    pub tv_nsec: i64,
}

impl shim_timespec {
    /// Rejects `tv_nsec` outside `[0, 1e9)`.
    pub fn to_core(self) -> Option<Timespec> {
        let ts = Timespec {
            tv_sec: self.tv_sec,
            tv_nsec: self.tv_nsec,
        };
        ts.is_normalized().then_some(ts)
    }

    pub const fn from_core(ts: Timespec) -> Self {
        Self {
            tv_sec: ts.tv_sec,
            tv_nsec: ts.tv_nsec,
        }
    }
}

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Debug)]
        pub struct $name {
            pub(crate) handle: *mut c_void,
        }

        impl $name {
            /// An uninitialized handle.
            pub const fn new() -> Self {
                Self {
                    handle: ptr::null_mut(),
                }
            }

            /// True between a successful init and destroy.
            pub fn is_initialized(&self) -> bool {
                !self.handle.is_null()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

opaque_handle!(
    /// Mutex handle (plain or recursive).
    mtx_t
);
opaque_handle!(
    /// Condition variable handle.
    cnd_t
);
opaque_handle!(
    /// Read-write lock handle.
    rwl_t
);

/// Thread identifier; 0 is never a valid thread.
pub type thrd_t = u64;

/// Thread-specific storage key; 0 is never a valid key.
pub type tss_t = u64;

/// Thread start routine. `C-unwind` so `shim_thrd_exit` can unwind through it.
pub type thrd_start_t = unsafe extern "C-unwind" fn(*mut c_void) -> c_int;

pub type tss_dtor_t = unsafe extern "C" fn(*mut c_void);

/// Once-flag; initialize statically with [`ONCE_FLAG_INIT`].
#[repr(C)]
pub struct once_flag {
    pub(crate) inner: OnceFlag,
}

pub const ONCE_FLAG_INIT: once_flag = once_flag {
    inner: OnceFlag::new(),
};
