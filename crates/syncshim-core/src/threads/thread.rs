//! Thread lifecycle: create, join, detach, identity, yield, sleep, exit.
//!
//! Shim-created threads are registered in a join table keyed by a
//! process-unique id. A thread is joined or detached exactly once; both
//! remove it from the table, so a second attempt is an `Error`. Threads the
//! shim did not create receive an id lazily on first use.

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread as std_thread;

use parking_lot::Mutex;

use super::tss;
use crate::config::runtime_config;
use crate::status::{SyncError, SyncResult};
use crate::sys::clock;
use crate::time::Timespec;

/// Opaque, comparable thread identifier. Never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ThreadId(u64);

impl ThreadId {
    #[must_use]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// `None` for 0, which no thread ever carries.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Option<Self> {
        if raw == 0 { None } else { Some(Self(raw)) }
    }
}

type JoinTable = HashMap<u64, std_thread::JoinHandle<isize>>;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SELF_ID: Cell<u64> = const { Cell::new(0) };
    static MANAGED: Cell<bool> = const { Cell::new(false) };
}

fn join_table() -> &'static Mutex<JoinTable> {
    static TABLE: OnceLock<Mutex<JoinTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(HashMap::new()))
}

fn fresh_thread_id() -> u64 {
    NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed)
}

/// Raw id of the calling thread, allocating one on first use.
pub(crate) fn current_raw() -> u64 {
    SELF_ID
        .try_with(|slot| {
            let existing = slot.get();
            if existing != 0 {
                return existing;
            }
            let id = fresh_thread_id();
            slot.set(id);
            id
        })
        // TLS already torn down: a one-off id still never matches an owner.
        .unwrap_or_else(|_| fresh_thread_id())
}

/// Payload carried by the unwind that [`exit`] starts.
struct ThreadExit(isize);

fn run_thread<F>(id: u64, start: F) -> isize
where
    F: FnOnce() -> isize,
{
    SELF_ID.with(|slot| slot.set(id));
    MANAGED.with(|m| m.set(true));
    let outcome = panic::catch_unwind(AssertUnwindSafe(start));
    tss::run_destructors();
    match outcome {
        Ok(code) => code,
        Err(payload) => match payload.downcast::<ThreadExit>() {
            Ok(exit) => exit.0,
            Err(other) => resume(other),
        },
    }
}

fn resume(payload: Box<dyn Any + Send>) -> ! {
    panic::resume_unwind(payload)
}

/// Start a thread running `start`; its return value is handed to [`join`].
///
/// `NoMem` when the platform refuses the thread.
pub fn spawn<F>(start: F) -> SyncResult<ThreadId>
where
    F: FnOnce() -> isize + Send + 'static,
{
    let config = runtime_config();
    let id = fresh_thread_id();
    let mut builder = std_thread::Builder::new().name(config.thread_name(id));
    if let Some(size) = config.thread_stack_size {
        builder = builder.stack_size(size);
    }

    // Held across the spawn so the child cannot detach itself before it is
    // registered.
    let mut table = join_table().lock();
    let handle = builder
        .spawn(move || run_thread(id, start))
        .map_err(|_| SyncError::NoMem)?;
    table.insert(id, handle);
    Ok(ThreadId(id))
}

/// Wait for `thread` to finish and take its result.
///
/// `Error` for self-join, unknown, detached or already-joined ids, and for a
/// thread that ended in a panic.
pub fn join(thread: ThreadId) -> SyncResult<isize> {
    if thread == current() {
        return Err(SyncError::Error);
    }
    let handle = join_table()
        .lock()
        .remove(&thread.0)
        .ok_or(SyncError::Error)?;
    handle.join().map_err(|_| SyncError::Error)
}

/// Let `thread` run to completion unobserved.
pub fn detach(thread: ThreadId) -> SyncResult {
    match join_table().lock().remove(&thread.0) {
        Some(handle) => {
            drop(handle);
            Ok(())
        }
        None => Err(SyncError::Error),
    }
}

#[must_use]
pub fn current() -> ThreadId {
    ThreadId(current_raw())
}

#[must_use]
pub fn equal(a: ThreadId, b: ThreadId) -> bool {
    a == b
}

/// True on threads started by [`spawn`].
#[must_use]
pub fn is_managed() -> bool {
    MANAGED.try_with(Cell::get).unwrap_or(false)
}

/// Shim threads not yet joined or detached.
#[must_use]
pub fn joinable_count() -> usize {
    join_table().lock().len()
}

pub fn yield_now() {
    std_thread::yield_now();
}

/// Result of a [`sleep`] that was not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepOutcome {
    Completed,
    /// Cut short by a signal with `remaining` left unslept.
    Interrupted { remaining: Timespec },
}

/// Suspend the caller for at least `span`. Negative or unnormalized spans
/// are `Error`.
pub fn sleep(span: Timespec) -> SyncResult<SleepOutcome> {
    if !span.is_normalized() || span.tv_sec < 0 {
        return Err(SyncError::Error);
    }
    Ok(match clock::sleep_for(span) {
        Ok(()) => SleepOutcome::Completed,
        Err(remaining) => SleepOutcome::Interrupted { remaining },
    })
}

/// End the calling thread with `result`.
///
/// On a shim thread this unwinds to the thread entry, runs TSS destructors
/// and makes `result` the join value. Anywhere else it ends the process
/// with `result` as the exit status.
pub fn exit(result: isize) -> ! {
    if is_managed() {
        panic::resume_unwind(Box::new(ThreadExit(result)))
    }
    tss::run_destructors();
    std::process::exit(result as i32)
}
