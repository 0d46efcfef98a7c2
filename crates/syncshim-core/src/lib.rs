//! # syncshim-core
//!
//! Portable threading and synchronization primitives with a uniform
//! result-code contract.
//!
//! Every primitive (mutex, recursive mutex, condition variable, read-write
//! lock, thread, thread-specific storage, once-flag) reports its outcome as a
//! [`SyncResult`], which flattens to the five numeric codes in [`status`].
//! Timed operations take absolute realtime deadlines ([`time::Timespec`]).
//!
//! The blocking machinery lives in a private backend selected at build time:
//! `parking_lot` by default, or explicit state machines under the
//! `portable-fallback` feature. No `unsafe` code is permitted outside it.

#![deny(unsafe_code)]

pub mod config;
pub mod status;
#[allow(unsafe_code)]
mod sys;
pub mod threads;
pub mod time;

pub use status::{SyncError, SyncResult, result_code};
pub use threads::{
    Condvar, Mutex, MutexKind, OnceFlag, RecursiveMutex, RwLock, ThreadId, TssKey,
};
pub use time::{Clock, Timespec};

/// Name of the backend compiled into this build (`"native"` or `"fallback"`).
pub const BACKEND: &str = sys::BACKEND;
