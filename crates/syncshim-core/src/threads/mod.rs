//! Owner-tracked synchronization primitives and thread lifecycle.
//!
//! Each type wraps a raw backend primitive and records which thread holds
//! it, so misuse (unlock by a non-holder, waiting without the mutex,
//! destroying a held lock) is reported as a result code instead of
//! corrupting state.

pub mod cond;
pub mod mutex;
pub mod once;
pub mod rwlock;
pub mod thread;
pub mod tss;

pub use cond::{CondLock, Condvar};
pub use mutex::{MTX_PLAIN, MTX_RECURSIVE, MTX_TIMED, Mutex, MutexKind, RecursiveMutex};
pub use once::{ONCE_FLAG_INIT, OnceFlag};
pub use rwlock::RwLock;
pub use thread::{SleepOutcome, ThreadId};
pub use tss::{TSS_DTOR_ITERATIONS, TSS_KEYS_MAX, TssDestructor, TssKey};

/// Owner slot value meaning "not held". Thread ids start at 1.
const NO_OWNER: u64 = 0;
