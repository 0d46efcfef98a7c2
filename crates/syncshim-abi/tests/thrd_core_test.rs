use std::ffi::{c_int, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use syncshim_abi::once_abi::shim_call_once;
use syncshim_abi::thrd_abi::{
    shim_thrd_create, shim_thrd_current, shim_thrd_detach, shim_thrd_equal, shim_thrd_exit,
    shim_thrd_join,
};
use syncshim_abi::tss_abi::{shim_tss_create, shim_tss_delete, shim_tss_get, shim_tss_set};
use syncshim_abi::{ONCE_FLAG_INIT, THRD_ERROR, THRD_SUCCESS, once_flag, thrd_t, tss_t};

unsafe extern "C-unwind" fn return_123(_arg: *mut c_void) -> c_int {
    123
}

unsafe extern "C-unwind" fn record_self(arg: *mut c_void) -> c_int {
    let slot = unsafe { &*(arg as *const AtomicU64) };
    slot.store(shim_thrd_current(), Ordering::SeqCst);
    0
}

unsafe extern "C-unwind" fn exit_early(_arg: *mut c_void) -> c_int {
    shim_thrd_exit(42);
}

fn spawn(func: syncshim_abi::thrd_start_t, arg: *mut c_void) -> thrd_t {
    let mut thr: thrd_t = 0;
    assert_eq!(unsafe { shim_thrd_create(&mut thr, Some(func), arg) }, THRD_SUCCESS);
    thr
}

#[test]
fn join_returns_start_result() {
    let thr = spawn(return_123, ptr::null_mut());
    let mut res: c_int = 0;
    unsafe {
        assert_eq!(shim_thrd_join(thr, &mut res), THRD_SUCCESS);
    }
    assert_eq!(res, 123);
}

#[test]
fn created_thread_sees_its_own_id() {
    let seen = AtomicU64::new(0);
    let thr = spawn(record_self, &seen as *const AtomicU64 as *mut c_void);
    unsafe {
        assert_eq!(shim_thrd_join(thr, ptr::null_mut()), THRD_SUCCESS);
    }
    let seen = seen.load(Ordering::SeqCst);
    assert_ne!(shim_thrd_equal(thr, seen), 0);
    assert_eq!(shim_thrd_equal(thr, shim_thrd_current()), 0);
}

#[test]
fn self_join_is_error() {
    unsafe {
        assert_eq!(shim_thrd_join(shim_thrd_current(), ptr::null_mut()), THRD_ERROR);
    }
}

#[test]
fn exit_hands_result_to_joiner() {
    let thr = spawn(exit_early, ptr::null_mut());
    let mut res: c_int = 0;
    unsafe {
        assert_eq!(shim_thrd_join(thr, &mut res), THRD_SUCCESS);
    }
    assert_eq!(res, 42);
}

#[test]
fn detached_thread_cannot_be_joined() {
    let thr = spawn(return_123, ptr::null_mut());
    unsafe {
        assert_eq!(shim_thrd_detach(thr), THRD_SUCCESS);
        assert_eq!(shim_thrd_detach(thr), THRD_ERROR);
        assert_eq!(shim_thrd_join(thr, ptr::null_mut()), THRD_ERROR);
    }
}

static INIT_RUNS: AtomicUsize = AtomicUsize::new(0);
static INIT_FLAG: once_flag = ONCE_FLAG_INIT;

unsafe extern "C" fn count_init() {
    INIT_RUNS.fetch_add(1, Ordering::SeqCst);
}

unsafe extern "C-unwind" fn race_call_once(_arg: *mut c_void) -> c_int {
    unsafe { shim_call_once(&INIT_FLAG as *const once_flag as *mut once_flag, Some(count_init)) }
}

#[test]
fn call_once_runs_once_across_threads() {
    let threads: Vec<thrd_t> = (0..8).map(|_| spawn(race_call_once, ptr::null_mut())).collect();
    for thr in threads {
        let mut res: c_int = -1;
        unsafe {
            assert_eq!(shim_thrd_join(thr, &mut res), THRD_SUCCESS);
        }
        assert_eq!(res, THRD_SUCCESS);
    }
    assert_eq!(INIT_RUNS.load(Ordering::SeqCst), 1);
}

static DTOR_SEEN: AtomicUsize = AtomicUsize::new(0);
static TSS_KEY: AtomicU64 = AtomicU64::new(0);

unsafe extern "C" fn record_dtor(value: *mut c_void) {
    DTOR_SEEN.store(value as usize, Ordering::SeqCst);
}

unsafe extern "C-unwind" fn set_tss_value(_arg: *mut c_void) -> c_int {
    let key = TSS_KEY.load(Ordering::SeqCst);
    unsafe {
        if !shim_tss_get(key).is_null() {
            return THRD_ERROR;
        }
        shim_tss_set(key, 0xBEEF as *mut c_void)
    }
}

#[test]
fn tss_values_are_per_thread_and_destroyed_at_exit() {
    let mut key: tss_t = 0;
    unsafe {
        assert_eq!(shim_tss_create(&mut key, Some(record_dtor)), THRD_SUCCESS);
        assert_eq!(shim_tss_set(key, 0x1 as *mut c_void), THRD_SUCCESS);
    }
    TSS_KEY.store(key, Ordering::SeqCst);

    let thr = spawn(set_tss_value, ptr::null_mut());
    let mut res: c_int = -1;
    unsafe {
        assert_eq!(shim_thrd_join(thr, &mut res), THRD_SUCCESS);
    }
    assert_eq!(res, THRD_SUCCESS);
    assert_eq!(DTOR_SEEN.load(Ordering::SeqCst), 0xBEEF);
    assert_eq!(shim_tss_get(key) as usize, 0x1);
    unsafe {
        assert_eq!(shim_tss_set(key, ptr::null_mut()), THRD_SUCCESS);
        assert_eq!(shim_tss_delete(key), THRD_SUCCESS);
    }
}
