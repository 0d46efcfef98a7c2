//! Blocking backends.
//!
//! Two interchangeable implementations of the raw primitives sit behind the
//! traits below. `native` (default) builds on `parking_lot`; `fallback`
//! (feature `portable-fallback`) keeps every primitive as an explicit state
//! machine guarded by a short critical section, with a wake channel for
//! blocked threads.
//!
//! Raw primitives know nothing about owners. Ownership checks happen one
//! layer up in `crate::threads`, so every `unlock*` here may assume the
//! caller holds what it releases.

use std::time::Instant;

pub mod clock;

#[cfg(not(feature = "portable-fallback"))]
mod native;
#[cfg(not(feature = "portable-fallback"))]
pub use native::{RawCondvar, RawLock, RawOnce, RawRwLock};
#[cfg(not(feature = "portable-fallback"))]
pub const BACKEND: &str = "native";

#[cfg(feature = "portable-fallback")]
mod fallback;
#[cfg(feature = "portable-fallback")]
pub use fallback::{RawCondvar, RawLock, RawOnce, RawRwLock};
#[cfg(feature = "portable-fallback")]
pub const BACKEND: &str = "fallback";

/// Exclusive lock without owner tracking.
pub trait RawLockOps: Send + Sync {
    fn new() -> Self;
    fn lock(&self);
    fn try_lock(&self) -> bool;
    /// Block until acquired or `deadline` passes. A past deadline tries once.
    fn try_lock_until(&self, deadline: Instant) -> bool;
    /// Release. The caller holds the lock.
    fn unlock(&self);
    fn is_locked(&self) -> bool;
}

/// Wait channel paired with a [`RawLockOps`] lock per call.
pub trait RawCondOps: Send + Sync {
    type Lock: RawLockOps;

    fn new() -> Self;
    /// Release `lock`, block until notified, reacquire. The caller holds
    /// `lock`. May wake spuriously.
    fn wait(&self, lock: &Self::Lock);
    /// As [`wait`](Self::wait) but gives up at `deadline`. Returns `true` on
    /// timeout. `lock` is held again on return either way.
    fn wait_until(&self, lock: &Self::Lock, deadline: Instant) -> bool;
    fn notify_one(&self);
    fn notify_all(&self);
}

/// Shared/exclusive lock without owner tracking.
pub trait RawRwLockOps: Send + Sync {
    fn new() -> Self;
    fn read(&self);
    fn try_read(&self) -> bool;
    fn try_read_until(&self, deadline: Instant) -> bool;
    fn write(&self);
    fn try_write(&self) -> bool;
    fn try_write_until(&self, deadline: Instant) -> bool;
    /// The caller holds a shared lock.
    fn unlock_read(&self);
    /// The caller holds the exclusive lock.
    fn unlock_write(&self);
    /// Held in either mode.
    fn is_locked(&self) -> bool;
}

/// One-shot initialization gate.
pub trait RawOnceOps: Sync {
    const INIT: Self;

    /// Run `f` unless a previous call completed. Concurrent callers block
    /// until the running call finishes. A panicking `f` leaves the gate
    /// unfinished so a later caller runs it again.
    fn call_once<F: FnOnce()>(&self, f: F);
    fn is_completed(&self) -> bool;
}
