//! Conformance scenarios, driven through the exported C surface.
//!
//! Each scenario exercises one observable property of the threading
//! contract with real `shim_thrd_*` threads and reports what it expected
//! next to what it saw.

use std::cell::UnsafeCell;
use std::ffi::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use syncshim_abi::cnd_abi::{
    shim_cnd_broadcast, shim_cnd_destroy, shim_cnd_init, shim_cnd_signal, shim_cnd_timedwait,
    shim_cnd_wait,
};
use syncshim_abi::mtx_abi::{
    shim_mtx_destroy, shim_mtx_init, shim_mtx_lock, shim_mtx_timedlock, shim_mtx_trylock,
    shim_mtx_unlock,
};
use syncshim_abi::once_abi::shim_call_once;
use syncshim_abi::rwl_abi::{
    shim_rwl_destroy, shim_rwl_init, shim_rwl_rdlock, shim_rwl_timedrdlock, shim_rwl_timedwrlock,
    shim_rwl_tryrdlock, shim_rwl_trywrlock, shim_rwl_unlock, shim_rwl_wrlock,
};
use syncshim_abi::thrd_abi::{
    shim_thrd_create, shim_thrd_current, shim_thrd_detach, shim_thrd_equal, shim_thrd_exit,
    shim_thrd_join, shim_thrd_sleep, shim_thrd_yield,
};
use syncshim_abi::time_abi::{
    shim_clock_now, shim_deadline_after_ms, shim_timespec_add, shim_timespec_cmp,
    shim_timespec_get, shim_timespec_sub,
};
use syncshim_abi::tss_abi::{shim_tss_create, shim_tss_delete, shim_tss_get, shim_tss_set};
use syncshim_abi::{
    ONCE_FLAG_INIT, THRD_BUSY, THRD_ERROR, THRD_SUCCESS, TIME_UTC, cnd_t, mtx_plain,
    mtx_recursive, mtx_t, mtx_timed, once_flag, rwl_t, shim_timespec, thrd_start_t, thrd_t,
    tss_t,
};
use syncshim_core::status::code_name;

/// Upper bound on any single rendezvous inside a scenario.
const RENDEZVOUS_LIMIT: Duration = Duration::from_secs(5);

/// What a scenario expected next to what it observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub expected: String,
    pub actual: String,
    /// Code returned by the scenario's primary symbol.
    pub result_code: c_int,
}

impl Check {
    fn new(expected: impl Into<String>, actual: impl Into<String>, result_code: c_int) -> Self {
        Self {
            expected: expected.into(),
            actual: actual.into(),
            result_code,
        }
    }

    /// A setup call failed before the property could be observed.
    fn setup_failed(expected: impl Into<String>, symbol: &str, code: c_int) -> Self {
        Self::new(expected, format!("{symbol} returned {}", code_name(code)), code)
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.expected == self.actual
    }
}

/// A named conformance scenario.
pub struct Scenario {
    pub name: &'static str,
    /// Primary ABI entry point under test.
    pub symbol: &'static str,
    pub summary: &'static str,
    run: fn() -> Check,
}

impl Scenario {
    pub fn run(&self) -> Check {
        (self.run)()
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("symbol", &self.symbol)
            .finish()
    }
}

pub static SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "mutex_exclusion",
        symbol: "shim_mtx_lock",
        summary: "4 threads x 1000 locked increments total 4000",
        run: mutex_exclusion,
    },
    Scenario {
        name: "mutex_trylock_busy",
        symbol: "shim_mtx_trylock",
        summary: "trylock of a mutex held by another thread is BUSY",
        run: mutex_trylock_busy,
    },
    Scenario {
        name: "mutex_timedlock_timeout",
        symbol: "shim_mtx_timedlock",
        summary: "timedlock of a mutex held elsewhere is TIMEDOUT",
        run: mutex_timedlock_timeout,
    },
    Scenario {
        name: "recursive_depth",
        symbol: "shim_mtx_lock",
        summary: "recursive mutex nests 5 deep and needs 5 unlocks",
        run: recursive_depth,
    },
    Scenario {
        name: "condvar_handoff",
        symbol: "shim_cnd_wait",
        summary: "wait releases the mutex, sees the signaled state, holds it again",
        run: condvar_handoff,
    },
    Scenario {
        name: "condvar_broadcast",
        symbol: "shim_cnd_broadcast",
        summary: "broadcast wakes all 4 waiters",
        run: condvar_broadcast,
    },
    Scenario {
        name: "condvar_timedwait",
        symbol: "shim_cnd_timedwait",
        summary: "timedwait with a 50ms deadline is TIMEDOUT with the mutex held",
        run: condvar_timedwait,
    },
    Scenario {
        name: "rwlock_readers",
        symbol: "shim_rwl_trywrlock",
        summary: "4 readers hold together and trywrlock is BUSY",
        run: rwlock_readers,
    },
    Scenario {
        name: "rwlock_writer",
        symbol: "shim_rwl_timedrdlock",
        summary: "a writer excludes readers until it unlocks",
        run: rwlock_writer,
    },
    Scenario {
        name: "thread_join_result",
        symbol: "shim_thrd_join",
        summary: "join yields the start routine's 123",
        run: thread_join_result,
    },
    Scenario {
        name: "thread_identity",
        symbol: "shim_thrd_current",
        summary: "a thread's own id equals the id its creator got",
        run: thread_identity,
    },
    Scenario {
        name: "thread_exit_tss",
        symbol: "shim_thrd_exit",
        summary: "thrd_exit hands its code to join after TSS destructors run",
        run: thread_exit_tss,
    },
    Scenario {
        name: "once_counter",
        symbol: "shim_call_once",
        summary: "8 threads racing call_once run the initializer once",
        run: once_counter,
    },
    Scenario {
        name: "null_robustness",
        symbol: "shim_mtx_lock",
        summary: "every entry point rejects null arguments",
        run: null_robustness,
    },
];

/// Look up a scenario by name.
#[must_use]
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

// ---------------------------------------------------------------------------
// Plumbing
// ---------------------------------------------------------------------------

/// Interior-mutable cell shared with shim threads. Every access happens
/// under a shim lock or before the threads start.
struct Shared<T>(UnsafeCell<T>);

// SAFETY: see the type docs; the scenarios serialize access.
unsafe impl<T> Sync for Shared<T> {}

impl<T> Shared<T> {
    const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    fn get(&self) -> *mut T {
        self.0.get()
    }
}

/// An initialized mutex handle, destroyed on drop.
struct ShimMutex(Shared<mtx_t>);

impl ShimMutex {
    fn new(kind: c_int) -> Result<Self, c_int> {
        let mtx = Self(Shared::new(mtx_t::new()));
        // SAFETY: freshly allocated handle.
        match unsafe { shim_mtx_init(mtx.ptr(), kind) } {
            THRD_SUCCESS => Ok(mtx),
            code => Err(code),
        }
    }

    fn ptr(&self) -> *mut mtx_t {
        self.0.get()
    }
}

impl Drop for ShimMutex {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`; a BUSY result leaks the handle.
        unsafe { shim_mtx_destroy(self.ptr()) };
    }
}

struct ShimCond(Shared<cnd_t>);

impl ShimCond {
    fn new() -> Result<Self, c_int> {
        let cond = Self(Shared::new(cnd_t::new()));
        // SAFETY: freshly allocated handle.
        match unsafe { shim_cnd_init(cond.ptr()) } {
            THRD_SUCCESS => Ok(cond),
            code => Err(code),
        }
    }

    fn ptr(&self) -> *mut cnd_t {
        self.0.get()
    }
}

impl Drop for ShimCond {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`.
        unsafe { shim_cnd_destroy(self.ptr()) };
    }
}

struct ShimRwLock(Shared<rwl_t>);

impl ShimRwLock {
    fn new() -> Result<Self, c_int> {
        let rwl = Self(Shared::new(rwl_t::new()));
        // SAFETY: freshly allocated handle.
        match unsafe { shim_rwl_init(rwl.ptr()) } {
            THRD_SUCCESS => Ok(rwl),
            code => Err(code),
        }
    }

    fn ptr(&self) -> *mut rwl_t {
        self.0.get()
    }
}

impl Drop for ShimRwLock {
    fn drop(&mut self) {
        // SAFETY: initialized in `new`.
        unsafe { shim_rwl_destroy(self.ptr()) };
    }
}

fn arg_of<T>(ctx: &T) -> *mut c_void {
    ctx as *const T as *mut c_void
}

/// # Safety
///
/// `arg` must come from [`arg_of`] on a `T` that outlives the call.
unsafe fn ctx_of<'a, T>(arg: *mut c_void) -> &'a T {
    // SAFETY: per the function contract.
    unsafe { &*(arg as *const T) }
}

fn spawn(start: thrd_start_t, arg: *mut c_void) -> Result<thrd_t, c_int> {
    let mut thr: thrd_t = 0;
    // SAFETY: `thr` is a valid out-pointer; `arg` outlives the joined thread.
    match unsafe { shim_thrd_create(&mut thr, Some(start), arg) } {
        THRD_SUCCESS => Ok(thr),
        code => Err(code),
    }
}

/// Join `thr`, returning the thread's own result.
fn join(thr: thrd_t) -> Result<c_int, c_int> {
    let mut res: c_int = 0;
    // SAFETY: `res` is a valid out-pointer.
    match unsafe { shim_thrd_join(thr, &mut res) } {
        THRD_SUCCESS => Ok(res),
        code => Err(code),
    }
}

/// Spawn `count` threads running `start(arg)` and join them all.
/// Returns the first failing create/join code or thread result.
fn run_workers(count: usize, start: thrd_start_t, arg: *mut c_void) -> c_int {
    let mut first_failure = THRD_SUCCESS;
    let mut threads = Vec::with_capacity(count);
    for _ in 0..count {
        match spawn(start, arg) {
            Ok(thr) => threads.push(thr),
            Err(code) => {
                first_failure = code;
                break;
            }
        }
    }
    for thr in threads {
        let code = join(thr).unwrap_or_else(|code| code);
        if first_failure == THRD_SUCCESS {
            first_failure = code;
        }
    }
    first_failure
}

/// Spin until `ready` holds or the rendezvous limit passes.
fn await_condition(mut ready: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while !ready() {
        if start.elapsed() > RENDEZVOUS_LIMIT {
            return false;
        }
        shim_thrd_yield();
    }
    true
}

fn deadline_after_ms(ms: i64) -> shim_timespec {
    let mut deadline = shim_timespec::default();
    // SAFETY: valid out-pointer.
    unsafe { shim_deadline_after_ms(ms, &mut deadline) };
    deadline
}

unsafe extern "C-unwind" fn try_lock_once(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is a ShimMutex owned by the spawning scenario.
    let mtx = unsafe { ctx_of::<ShimMutex>(arg) };
    // SAFETY: initialized handle.
    unsafe {
        let code = shim_mtx_trylock(mtx.ptr());
        if code == THRD_SUCCESS {
            shim_mtx_unlock(mtx.ptr());
        }
        code
    }
}

/// Result of a trylock attempted from a fresh shim thread.
fn trylock_elsewhere(mtx: &ShimMutex) -> c_int {
    match spawn(try_lock_once, arg_of(mtx)) {
        Ok(thr) => join(thr).unwrap_or_else(|code| code),
        Err(code) => code,
    }
}

// ---------------------------------------------------------------------------
// Mutex
// ---------------------------------------------------------------------------

const EXCLUSION_THREADS: usize = 4;
const EXCLUSION_ROUNDS: u64 = 1000;

struct CounterCtx {
    mtx: ShimMutex,
    value: Shared<u64>,
}

unsafe extern "C-unwind" fn bump_counter(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the scenario's CounterCtx.
    let ctx = unsafe { ctx_of::<CounterCtx>(arg) };
    for _ in 0..EXCLUSION_ROUNDS {
        // SAFETY: initialized handle; `value` is only touched under it.
        unsafe {
            let code = shim_mtx_lock(ctx.mtx.ptr());
            if code != THRD_SUCCESS {
                return code;
            }
            *ctx.value.get() += 1;
            let code = shim_mtx_unlock(ctx.mtx.ptr());
            if code != THRD_SUCCESS {
                return code;
            }
        }
    }
    THRD_SUCCESS
}

fn mutex_exclusion() -> Check {
    let expected = (EXCLUSION_THREADS as u64 * EXCLUSION_ROUNDS).to_string();
    let ctx = match ShimMutex::new(mtx_plain) {
        Ok(mtx) => CounterCtx {
            mtx,
            value: Shared::new(0),
        },
        Err(code) => return Check::setup_failed(expected, "shim_mtx_init", code),
    };
    let code = run_workers(EXCLUSION_THREADS, bump_counter, arg_of(&ctx));
    // SAFETY: every worker has been joined.
    let total = unsafe { *ctx.value.get() };
    Check::new(expected, total.to_string(), code)
}

fn mutex_trylock_busy() -> Check {
    let mtx = match ShimMutex::new(mtx_plain) {
        Ok(mtx) => mtx,
        Err(code) => return Check::setup_failed("BUSY", "shim_mtx_init", code),
    };
    // SAFETY: initialized handle.
    let code = unsafe { shim_mtx_lock(mtx.ptr()) };
    if code != THRD_SUCCESS {
        return Check::setup_failed("BUSY", "shim_mtx_lock", code);
    }
    let observed = trylock_elsewhere(&mtx);
    // SAFETY: held by this thread.
    unsafe { shim_mtx_unlock(mtx.ptr()) };
    Check::new("BUSY", code_name(observed), observed)
}

struct HolderCtx {
    mtx: ShimMutex,
    locked: AtomicBool,
    release: AtomicBool,
}

unsafe extern "C-unwind" fn hold_until_released(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the scenario's HolderCtx.
    let ctx = unsafe { ctx_of::<HolderCtx>(arg) };
    // SAFETY: initialized handle.
    let code = unsafe { shim_mtx_lock(ctx.mtx.ptr()) };
    if code != THRD_SUCCESS {
        return code;
    }
    ctx.locked.store(true, Ordering::Release);
    await_condition(|| ctx.release.load(Ordering::Acquire));
    // SAFETY: held by this thread.
    unsafe { shim_mtx_unlock(ctx.mtx.ptr()) }
}

fn mutex_timedlock_timeout() -> Check {
    let expected = "TIMEDOUT, then SUCCESS once released";
    let ctx = match ShimMutex::new(mtx_timed) {
        Ok(mtx) => HolderCtx {
            mtx,
            locked: AtomicBool::new(false),
            release: AtomicBool::new(false),
        },
        Err(code) => return Check::setup_failed(expected, "shim_mtx_init", code),
    };
    let holder = match spawn(hold_until_released, arg_of(&ctx)) {
        Ok(thr) => thr,
        Err(code) => return Check::setup_failed(expected, "shim_thrd_create", code),
    };
    await_condition(|| ctx.locked.load(Ordering::Acquire));
    let deadline = deadline_after_ms(20);
    // SAFETY: initialized handle and valid deadline.
    let timed_out = unsafe { shim_mtx_timedlock(ctx.mtx.ptr(), &deadline) };
    ctx.release.store(true, Ordering::Release);
    let holder_code = join(holder).unwrap_or_else(|code| code);

    let deadline = deadline_after_ms(1000);
    // SAFETY: as above.
    let acquired = unsafe { shim_mtx_timedlock(ctx.mtx.ptr(), &deadline) };
    if acquired == THRD_SUCCESS {
        // SAFETY: held by this thread.
        unsafe { shim_mtx_unlock(ctx.mtx.ptr()) };
    }
    let actual = if holder_code != THRD_SUCCESS {
        format!("holder failed with {}", code_name(holder_code))
    } else {
        format!(
            "{}, then {} once released",
            code_name(timed_out),
            code_name(acquired)
        )
    };
    Check::new(expected, actual, timed_out)
}

fn recursive_depth() -> Check {
    const DEPTH: usize = 5;
    let expected = format!("locked {DEPTH}, elsewhere BUSY, unlocked {DEPTH}, extra unlock ERROR");
    let mtx = match ShimMutex::new(mtx_plain | mtx_recursive) {
        Ok(mtx) => mtx,
        Err(code) => return Check::setup_failed(expected, "shim_mtx_init", code),
    };
    // SAFETY: initialized handle throughout.
    let locked = (0..DEPTH)
        .filter(|_| unsafe { shim_mtx_lock(mtx.ptr()) } == THRD_SUCCESS)
        .count();
    let elsewhere = trylock_elsewhere(&mtx);
    let unlocked = (0..DEPTH)
        .filter(|_| unsafe { shim_mtx_unlock(mtx.ptr()) } == THRD_SUCCESS)
        .count();
    let extra = unsafe { shim_mtx_unlock(mtx.ptr()) };
    let actual = format!(
        "locked {locked}, elsewhere {}, unlocked {unlocked}, extra unlock {}",
        code_name(elsewhere),
        code_name(extra)
    );
    Check::new(expected, actual, extra)
}

// ---------------------------------------------------------------------------
// Condition variable
// ---------------------------------------------------------------------------

struct CondCtx {
    mtx: ShimMutex,
    cond: ShimCond,
    /// Guarded by `mtx`.
    flag: Shared<bool>,
    /// Guarded by `mtx`.
    value: Shared<u32>,
    parked: AtomicUsize,
    woken: AtomicUsize,
}

impl CondCtx {
    fn new() -> Result<Self, (&'static str, c_int)> {
        Ok(Self {
            mtx: ShimMutex::new(mtx_plain).map_err(|code| ("shim_mtx_init", code))?,
            cond: ShimCond::new().map_err(|code| ("shim_cnd_init", code))?,
            flag: Shared::new(false),
            value: Shared::new(0),
            parked: AtomicUsize::new(0),
            woken: AtomicUsize::new(0),
        })
    }

    /// Lock, set the flag and `value`, notify, unlock.
    fn publish(&self, value: u32, notify: unsafe extern "C" fn(*mut cnd_t) -> c_int) -> c_int {
        // SAFETY: initialized handles; flag and value are guarded by `mtx`.
        unsafe {
            let code = shim_mtx_lock(self.mtx.ptr());
            if code != THRD_SUCCESS {
                return code;
            }
            *self.value.get() = value;
            *self.flag.get() = true;
            let code = notify(self.cond.ptr());
            shim_mtx_unlock(self.mtx.ptr());
            code
        }
    }
}

/// Wait for the flag, then return the published value.
unsafe extern "C-unwind" fn wait_for_flag(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the scenario's CondCtx.
    let ctx = unsafe { ctx_of::<CondCtx>(arg) };
    // SAFETY: initialized handles; flag and value are guarded by `mtx`.
    unsafe {
        let code = shim_mtx_lock(ctx.mtx.ptr());
        if code != THRD_SUCCESS {
            return code;
        }
        ctx.parked.fetch_add(1, Ordering::AcqRel);
        while !*ctx.flag.get() {
            let code = shim_cnd_wait(ctx.cond.ptr(), ctx.mtx.ptr());
            if code != THRD_SUCCESS {
                shim_mtx_unlock(ctx.mtx.ptr());
                return code;
            }
        }
        let value = *ctx.value.get();
        ctx.woken.fetch_add(1, Ordering::AcqRel);
        // Fails unless wait handed the mutex back.
        let code = shim_mtx_unlock(ctx.mtx.ptr());
        if code != THRD_SUCCESS {
            return code;
        }
        value as c_int
    }
}

fn condvar_handoff() -> Check {
    let ctx = match CondCtx::new() {
        Ok(ctx) => ctx,
        Err((symbol, code)) => return Check::setup_failed("42", symbol, code),
    };
    let waiter = match spawn(wait_for_flag, arg_of(&ctx)) {
        Ok(thr) => thr,
        Err(code) => return Check::setup_failed("42", "shim_thrd_create", code),
    };
    await_condition(|| ctx.parked.load(Ordering::Acquire) == 1);
    let signaled = ctx.publish(42, shim_cnd_signal);
    match join(waiter) {
        Ok(value) => Check::new("42", value.to_string(), signaled),
        Err(code) => Check::setup_failed("42", "shim_thrd_join", code),
    }
}

fn condvar_broadcast() -> Check {
    const WAITERS: usize = 4;
    let expected = WAITERS.to_string();
    let ctx = match CondCtx::new() {
        Ok(ctx) => ctx,
        Err((symbol, code)) => return Check::setup_failed(expected, symbol, code),
    };
    let mut threads = Vec::with_capacity(WAITERS);
    for _ in 0..WAITERS {
        match spawn(wait_for_flag, arg_of(&ctx)) {
            Ok(thr) => threads.push(thr),
            Err(code) => {
                ctx.publish(0, shim_cnd_broadcast);
                threads.into_iter().for_each(|thr| drop(join(thr)));
                return Check::setup_failed(expected, "shim_thrd_create", code);
            }
        }
    }
    await_condition(|| ctx.parked.load(Ordering::Acquire) == WAITERS);
    let code = ctx.publish(7, shim_cnd_broadcast);
    let delivered = threads
        .into_iter()
        .filter(|thr| join(*thr) == Ok(7))
        .count();
    let woken = ctx.woken.load(Ordering::Acquire);
    let actual = if delivered == woken {
        woken.to_string()
    } else {
        format!("{woken} woken but {delivered} saw the value")
    };
    Check::new(expected, actual, code)
}

fn condvar_timedwait() -> Check {
    let expected = "TIMEDOUT with mutex held";
    let ctx = match CondCtx::new() {
        Ok(ctx) => ctx,
        Err((symbol, code)) => return Check::setup_failed(expected, symbol, code),
    };
    let started = Instant::now();
    // SAFETY: initialized handles.
    let code = unsafe {
        let lock = shim_mtx_lock(ctx.mtx.ptr());
        if lock != THRD_SUCCESS {
            return Check::setup_failed(expected, "shim_mtx_lock", lock);
        }
        let deadline = deadline_after_ms(50);
        shim_cnd_timedwait(ctx.cond.ptr(), ctx.mtx.ptr(), &deadline)
    };
    let waited = started.elapsed();
    let elsewhere = trylock_elsewhere(&ctx.mtx);
    // SAFETY: held by this thread when the wait returned.
    let unlock = unsafe { shim_mtx_unlock(ctx.mtx.ptr()) };

    let actual = if waited < Duration::from_millis(45) {
        format!("{} after only {}ms", code_name(code), waited.as_millis())
    } else if elsewhere == THRD_BUSY && unlock == THRD_SUCCESS {
        format!("{} with mutex held", code_name(code))
    } else {
        format!("{} with mutex not held", code_name(code))
    };
    Check::new(expected, actual, code)
}

// ---------------------------------------------------------------------------
// Read-write lock
// ---------------------------------------------------------------------------

struct ReaderCtx {
    rwl: ShimRwLock,
    inside: AtomicUsize,
    release: AtomicBool,
}

unsafe extern "C-unwind" fn read_until_released(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the scenario's ReaderCtx.
    let ctx = unsafe { ctx_of::<ReaderCtx>(arg) };
    // SAFETY: initialized handle.
    let code = unsafe { shim_rwl_rdlock(ctx.rwl.ptr()) };
    if code != THRD_SUCCESS {
        return code;
    }
    ctx.inside.fetch_add(1, Ordering::AcqRel);
    await_condition(|| ctx.release.load(Ordering::Acquire));
    ctx.inside.fetch_sub(1, Ordering::AcqRel);
    // SAFETY: this thread holds a read lock.
    unsafe { shim_rwl_unlock(ctx.rwl.ptr()) }
}

fn rwlock_readers() -> Check {
    const READERS: usize = 4;
    let expected = format!("{READERS} readers together, trywrlock BUSY");
    let ctx = match ShimRwLock::new() {
        Ok(rwl) => ReaderCtx {
            rwl,
            inside: AtomicUsize::new(0),
            release: AtomicBool::new(false),
        },
        Err(code) => return Check::setup_failed(expected, "shim_rwl_init", code),
    };
    let mut threads = Vec::with_capacity(READERS);
    for _ in 0..READERS {
        match spawn(read_until_released, arg_of(&ctx)) {
            Ok(thr) => threads.push(thr),
            Err(code) => {
                ctx.release.store(true, Ordering::Release);
                threads.into_iter().for_each(|thr| drop(join(thr)));
                return Check::setup_failed(expected, "shim_thrd_create", code);
            }
        }
    }
    await_condition(|| ctx.inside.load(Ordering::Acquire) == READERS);
    let together = ctx.inside.load(Ordering::Acquire);
    // SAFETY: initialized handle.
    let code = unsafe { shim_rwl_trywrlock(ctx.rwl.ptr()) };
    if code == THRD_SUCCESS {
        // SAFETY: just acquired for writing.
        unsafe { shim_rwl_unlock(ctx.rwl.ptr()) };
    }
    ctx.release.store(true, Ordering::Release);
    let failure = threads
        .into_iter()
        .map(|thr| join(thr).unwrap_or_else(|code| code))
        .find(|code| *code != THRD_SUCCESS);
    let actual = match failure {
        Some(bad) => format!("reader failed with {}", code_name(bad)),
        None => format!("{together} readers together, trywrlock {}", code_name(code)),
    };
    Check::new(expected, actual, code)
}

unsafe extern "C-unwind" fn timed_read(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the scenario's ShimRwLock.
    let rwl = unsafe { ctx_of::<ShimRwLock>(arg) };
    let deadline = deadline_after_ms(20);
    // SAFETY: initialized handle.
    unsafe {
        let code = shim_rwl_timedrdlock(rwl.ptr(), &deadline);
        if code == THRD_SUCCESS {
            shim_rwl_unlock(rwl.ptr());
        }
        code
    }
}

fn rwlock_writer() -> Check {
    let expected = "reader TIMEDOUT while written, SUCCESS after";
    let rwl = match ShimRwLock::new() {
        Ok(rwl) => rwl,
        Err(code) => return Check::setup_failed(expected, "shim_rwl_init", code),
    };
    let read_elsewhere = |rwl: &ShimRwLock| match spawn(timed_read, arg_of(rwl)) {
        Ok(thr) => join(thr).unwrap_or_else(|code| code),
        Err(code) => code,
    };
    // SAFETY: initialized handle.
    let code = unsafe { shim_rwl_wrlock(rwl.ptr()) };
    if code != THRD_SUCCESS {
        return Check::setup_failed(expected, "shim_rwl_wrlock", code);
    }
    let during = read_elsewhere(&rwl);
    // SAFETY: held for writing by this thread.
    unsafe { shim_rwl_unlock(rwl.ptr()) };
    let after = read_elsewhere(&rwl);
    let actual = format!(
        "reader {} while written, {} after",
        code_name(during),
        code_name(after)
    );
    Check::new(expected, actual, during)
}

// ---------------------------------------------------------------------------
// Threads, storage, once
// ---------------------------------------------------------------------------

unsafe extern "C-unwind" fn return_123(_arg: *mut c_void) -> c_int {
    123
}

fn thread_join_result() -> Check {
    match spawn(return_123, ptr::null_mut()) {
        Ok(thr) => match join(thr) {
            Ok(value) => Check::new("123", value.to_string(), THRD_SUCCESS),
            Err(code) => Check::setup_failed("123", "shim_thrd_join", code),
        },
        Err(code) => Check::setup_failed("123", "shim_thrd_create", code),
    }
}

unsafe extern "C-unwind" fn record_current(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the scenario's AtomicU64.
    let slot = unsafe { ctx_of::<AtomicU64>(arg) };
    slot.store(shim_thrd_current(), Ordering::Release);
    THRD_SUCCESS
}

fn thread_identity() -> Check {
    let expected = "self matches true, creator differs true";
    let seen = AtomicU64::new(0);
    let thr = match spawn(record_current, arg_of(&seen)) {
        Ok(thr) => thr,
        Err(code) => return Check::setup_failed(expected, "shim_thrd_create", code),
    };
    if let Err(code) = join(thr) {
        return Check::setup_failed(expected, "shim_thrd_join", code);
    }
    let matches = shim_thrd_equal(thr, seen.load(Ordering::Acquire)) != 0;
    let differs = shim_thrd_equal(thr, shim_thrd_current()) == 0;
    let actual = format!("self matches {matches}, creator differs {differs}");
    Check::new(expected, actual, THRD_SUCCESS)
}

const EXIT_CODE: c_int = 77;
const TSS_VALUE: usize = 0x5EED;

static TSS_KEY: AtomicU64 = AtomicU64::new(0);
static TSS_DESTROYED: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn record_destroyed(value: *mut c_void) {
    TSS_DESTROYED.store(value as usize, Ordering::Release);
}

unsafe extern "C-unwind" fn set_value_then_exit(_arg: *mut c_void) -> c_int {
    let key: tss_t = TSS_KEY.load(Ordering::Acquire);
    // SAFETY: live key; the value is an opaque token, never dereferenced.
    let code = unsafe { shim_tss_set(key, TSS_VALUE as *mut c_void) };
    if code != THRD_SUCCESS {
        return code;
    }
    shim_thrd_exit(EXIT_CODE)
}

fn thread_exit_tss() -> Check {
    let expected = format!("join {EXIT_CODE}, destructor saw {TSS_VALUE:#x}");
    let mut key: tss_t = 0;
    // SAFETY: valid out-pointer.
    let code = unsafe { shim_tss_create(&mut key, Some(record_destroyed)) };
    if code != THRD_SUCCESS {
        return Check::setup_failed(expected, "shim_tss_create", code);
    }
    TSS_KEY.store(key, Ordering::Release);
    TSS_DESTROYED.store(0, Ordering::Release);

    let joined = spawn(set_value_then_exit, ptr::null_mut()).and_then(join);
    // SAFETY: live key.
    unsafe { shim_tss_delete(key) };
    match joined {
        Ok(value) => {
            let seen = TSS_DESTROYED.load(Ordering::Acquire);
            Check::new(
                expected,
                format!("join {value}, destructor saw {seen:#x}"),
                THRD_SUCCESS,
            )
        }
        Err(code) => Check::setup_failed(expected, "shim_thrd_create/join", code),
    }
}

static ONCE_RUNS: AtomicU32 = AtomicU32::new(0);

unsafe extern "C" fn count_once() {
    ONCE_RUNS.fetch_add(1, Ordering::AcqRel);
}

unsafe extern "C-unwind" fn race_once(arg: *mut c_void) -> c_int {
    // SAFETY: `arg` is the scenario's once_flag.
    let flag = unsafe { ctx_of::<once_flag>(arg) };
    // SAFETY: valid flag and initializer.
    unsafe { shim_call_once(flag as *const once_flag as *mut once_flag, Some(count_once)) }
}

fn once_counter() -> Check {
    const RACERS: usize = 8;
    let flag: once_flag = ONCE_FLAG_INIT;
    let before = ONCE_RUNS.load(Ordering::Acquire);
    let code = run_workers(RACERS, race_once, arg_of(&flag));
    let runs = ONCE_RUNS.load(Ordering::Acquire) - before;
    Check::new("1", runs.to_string(), code)
}

// ---------------------------------------------------------------------------
// Null robustness
// ---------------------------------------------------------------------------

unsafe extern "C-unwind" fn noop(_arg: *mut c_void) -> c_int {
    THRD_SUCCESS
}

/// Every entry point called with null (or zero) where it expects a handle or
/// pointer, paired with whether it rejected the call.
fn null_rejections() -> Vec<(&'static str, bool)> {
    let ts = shim_timespec::default();
    let mut out = shim_timespec::default();
    let mut thr: thrd_t = 0;
    let null_mtx: *mut mtx_t = ptr::null_mut();
    let null_cnd: *mut cnd_t = ptr::null_mut();
    let null_rwl: *mut rwl_t = ptr::null_mut();
    let null_ts: *const shim_timespec = ptr::null();

    // SAFETY: every call passes null where a pointer is expected, which the
    // entry points must reject without dereferencing.
    unsafe {
        vec![
            ("shim_mtx_init", shim_mtx_init(null_mtx, mtx_plain) == THRD_ERROR),
            ("shim_mtx_lock", shim_mtx_lock(null_mtx) == THRD_ERROR),
            ("shim_mtx_trylock", shim_mtx_trylock(null_mtx) == THRD_ERROR),
            ("shim_mtx_timedlock", shim_mtx_timedlock(null_mtx, &ts) == THRD_ERROR),
            ("shim_mtx_unlock", shim_mtx_unlock(null_mtx) == THRD_ERROR),
            ("shim_mtx_destroy", shim_mtx_destroy(null_mtx) == THRD_ERROR),
            ("shim_cnd_init", shim_cnd_init(null_cnd) == THRD_ERROR),
            ("shim_cnd_signal", shim_cnd_signal(null_cnd) == THRD_ERROR),
            ("shim_cnd_broadcast", shim_cnd_broadcast(null_cnd) == THRD_ERROR),
            ("shim_cnd_wait", shim_cnd_wait(null_cnd, null_mtx) == THRD_ERROR),
            (
                "shim_cnd_timedwait",
                shim_cnd_timedwait(null_cnd, null_mtx, null_ts) == THRD_ERROR,
            ),
            ("shim_cnd_destroy", shim_cnd_destroy(null_cnd) == THRD_ERROR),
            ("shim_rwl_init", shim_rwl_init(null_rwl) == THRD_ERROR),
            ("shim_rwl_rdlock", shim_rwl_rdlock(null_rwl) == THRD_ERROR),
            ("shim_rwl_wrlock", shim_rwl_wrlock(null_rwl) == THRD_ERROR),
            ("shim_rwl_tryrdlock", shim_rwl_tryrdlock(null_rwl) == THRD_ERROR),
            ("shim_rwl_trywrlock", shim_rwl_trywrlock(null_rwl) == THRD_ERROR),
            (
                "shim_rwl_timedrdlock",
                shim_rwl_timedrdlock(null_rwl, null_ts) == THRD_ERROR,
            ),
            (
                "shim_rwl_timedwrlock",
                shim_rwl_timedwrlock(null_rwl, null_ts) == THRD_ERROR,
            ),
            ("shim_rwl_unlock", shim_rwl_unlock(null_rwl) == THRD_ERROR),
            ("shim_rwl_destroy", shim_rwl_destroy(null_rwl) == THRD_ERROR),
            (
                "shim_thrd_create",
                shim_thrd_create(ptr::null_mut(), Some(noop), ptr::null_mut()) == THRD_ERROR
                    && shim_thrd_create(&mut thr, None, ptr::null_mut()) == THRD_ERROR,
            ),
            ("shim_thrd_join", shim_thrd_join(0, ptr::null_mut()) == THRD_ERROR),
            ("shim_thrd_detach", shim_thrd_detach(0) == THRD_ERROR),
            (
                "shim_thrd_sleep",
                shim_thrd_sleep(null_ts, ptr::null_mut()) == THRD_ERROR,
            ),
            ("shim_tss_create", shim_tss_create(ptr::null_mut(), None) == THRD_ERROR),
            ("shim_tss_get", shim_tss_get(0).is_null()),
            ("shim_tss_set", shim_tss_set(0, ptr::null_mut()) == THRD_ERROR),
            ("shim_tss_delete", shim_tss_delete(0) == THRD_ERROR),
            ("shim_call_once", shim_call_once(ptr::null_mut(), None) == THRD_ERROR),
            ("shim_timespec_get", shim_timespec_get(ptr::null_mut(), TIME_UTC) == 0),
            ("shim_clock_now", shim_clock_now(TIME_UTC, ptr::null_mut()) == THRD_ERROR),
            (
                "shim_timespec_add",
                shim_timespec_add(null_ts, &ts, &mut out) == THRD_ERROR,
            ),
            (
                "shim_timespec_sub",
                shim_timespec_sub(&ts, null_ts, &mut out) == THRD_ERROR,
            ),
            (
                "shim_timespec_cmp",
                shim_timespec_cmp(&ts, &ts, ptr::null_mut()) == THRD_ERROR,
            ),
            (
                "shim_deadline_after_ms",
                shim_deadline_after_ms(1, ptr::null_mut()) == THRD_ERROR,
            ),
        ]
    }
}

fn null_robustness() -> Check {
    let rejections = null_rejections();
    let expected = format!("all {} rejected", rejections.len());
    let accepted: Vec<&str> = rejections
        .iter()
        .filter(|(_, rejected)| !rejected)
        .map(|(symbol, _)| *symbol)
        .collect();
    let actual = if accepted.is_empty() {
        expected.clone()
    } else {
        format!("accepted: {}", accepted.join(", "))
    };
    Check::new(expected, actual, THRD_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_names_are_unique_and_symbols_exported() {
        let mut names: Vec<_> = SCENARIOS.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), SCENARIOS.len());
        assert!(SCENARIOS.iter().all(|s| s.symbol.starts_with("shim_")));
    }

    #[test]
    fn find_by_name() {
        assert_eq!(find("once_counter").map(|s| s.symbol), Some("shim_call_once"));
        assert!(find("no_such_scenario").is_none());
    }

    #[test]
    fn quick_scenarios_pass() {
        for name in ["mutex_trylock_busy", "thread_join_result", "null_robustness"] {
            let check = find(name).unwrap().run();
            assert!(check.passed(), "{name}: {check:?}");
        }
    }

    #[test]
    fn null_checks_cover_every_rwlock_entry() {
        let symbols: Vec<_> = null_rejections().into_iter().map(|(s, _)| s).collect();
        for entry in [
            "shim_rwl_init",
            "shim_rwl_rdlock",
            "shim_rwl_wrlock",
            "shim_rwl_tryrdlock",
            "shim_rwl_trywrlock",
            "shim_rwl_timedrdlock",
            "shim_rwl_timedwrlock",
            "shim_rwl_unlock",
            "shim_rwl_destroy",
        ] {
            assert!(symbols.contains(&entry), "{entry} not covered");
        }
        let mut unique = symbols.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(unique.len(), symbols.len());
    }
}
