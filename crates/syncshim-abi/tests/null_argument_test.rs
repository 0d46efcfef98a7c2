//! Every entry point must reject null or uninitialized arguments with a
//! result code instead of crashing.

use std::ffi::{c_int, c_void};
use std::ptr;

use syncshim_abi::cnd_abi::*;
use syncshim_abi::counters::result_counters;
use syncshim_abi::mtx_abi::*;
use syncshim_abi::once_abi::shim_call_once;
use syncshim_abi::rwl_abi::*;
use syncshim_abi::thrd_abi::*;
use syncshim_abi::time_abi::*;
use syncshim_abi::tss_abi::*;
use syncshim_abi::{THRD_ERROR, TIME_UTC, cnd_t, mtx_plain, mtx_t, rwl_t, shim_timespec};

unsafe extern "C-unwind" fn noop(_arg: *mut c_void) -> c_int {
    0
}

#[test]
fn null_handles_are_errors() {
    let deadline = shim_timespec::default();
    unsafe {
        assert_eq!(shim_mtx_init(ptr::null_mut(), mtx_plain), THRD_ERROR);
        assert_eq!(shim_mtx_lock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_mtx_trylock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_mtx_timedlock(ptr::null_mut(), &deadline), THRD_ERROR);
        assert_eq!(shim_mtx_unlock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_mtx_destroy(ptr::null_mut()), THRD_ERROR);

        assert_eq!(shim_cnd_init(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_cnd_signal(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_cnd_broadcast(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_cnd_wait(ptr::null_mut(), ptr::null_mut()), THRD_ERROR);
        assert_eq!(
            shim_cnd_timedwait(ptr::null_mut(), ptr::null_mut(), &deadline),
            THRD_ERROR
        );
        assert_eq!(shim_cnd_destroy(ptr::null_mut()), THRD_ERROR);

        assert_eq!(shim_rwl_init(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_rwl_rdlock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_rwl_wrlock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_rwl_tryrdlock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_rwl_trywrlock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_rwl_timedrdlock(ptr::null_mut(), &deadline), THRD_ERROR);
        assert_eq!(shim_rwl_timedwrlock(ptr::null_mut(), &deadline), THRD_ERROR);
        assert_eq!(shim_rwl_unlock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_rwl_destroy(ptr::null_mut()), THRD_ERROR);
    }
}

#[test]
fn uninitialized_handles_are_errors() {
    let mut mtx = mtx_t::new();
    let mut cond = cnd_t::new();
    let mut rwl = rwl_t::new();
    unsafe {
        assert_eq!(shim_mtx_lock(&mut mtx), THRD_ERROR);
        assert_eq!(shim_mtx_unlock(&mut mtx), THRD_ERROR);
        assert_eq!(shim_mtx_destroy(&mut mtx), THRD_ERROR);
        assert_eq!(shim_cnd_signal(&mut cond), THRD_ERROR);
        assert_eq!(shim_cnd_wait(&mut cond, &mut mtx), THRD_ERROR);
        assert_eq!(shim_rwl_rdlock(&mut rwl), THRD_ERROR);
        assert_eq!(shim_rwl_destroy(&mut rwl), THRD_ERROR);
    }
}

#[test]
fn null_deadlines_are_errors() {
    let mut mtx = mtx_t::new();
    let mut cond = cnd_t::new();
    let mut rwl = rwl_t::new();
    unsafe {
        assert_eq!(shim_mtx_init(&mut mtx, mtx_plain), 0);
        assert_eq!(shim_cnd_init(&mut cond), 0);
        assert_eq!(shim_rwl_init(&mut rwl), 0);

        assert_eq!(shim_mtx_timedlock(&mut mtx, ptr::null()), THRD_ERROR);
        assert_eq!(shim_mtx_lock(&mut mtx), 0);
        assert_eq!(shim_cnd_timedwait(&mut cond, &mut mtx, ptr::null()), THRD_ERROR);
        assert_eq!(shim_mtx_unlock(&mut mtx), 0);
        assert_eq!(shim_rwl_timedrdlock(&mut rwl, ptr::null()), THRD_ERROR);
        assert_eq!(shim_rwl_timedwrlock(&mut rwl, ptr::null()), THRD_ERROR);

        let unnormalized = shim_timespec {
            tv_sec: 0,
            tv_nsec: 2_000_000_000,
        };
        assert_eq!(shim_mtx_timedlock(&mut mtx, &unnormalized), THRD_ERROR);

        assert_eq!(shim_rwl_destroy(&mut rwl), 0);
        assert_eq!(shim_cnd_destroy(&mut cond), 0);
        assert_eq!(shim_mtx_destroy(&mut mtx), 0);
    }
}

#[test]
fn thread_and_storage_nulls() {
    let mut thr = 0;
    let span = shim_timespec::default();
    unsafe {
        assert_eq!(shim_thrd_create(ptr::null_mut(), Some(noop), ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_thrd_create(&mut thr, None, ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_thrd_join(0, ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_thrd_detach(0), THRD_ERROR);
        assert_eq!(shim_thrd_sleep(ptr::null(), ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_thrd_sleep(&span, ptr::null_mut()), 0);

        assert_eq!(shim_tss_create(ptr::null_mut(), None), THRD_ERROR);
        assert!(shim_tss_get(0).is_null());
        assert_eq!(shim_tss_set(0, ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_tss_delete(0), THRD_ERROR);

        assert_eq!(shim_call_once(ptr::null_mut(), None), THRD_ERROR);
    }
}

#[test]
fn time_nulls() {
    let ts = shim_timespec::default();
    let mut out = shim_timespec::default();
    let mut ord: c_int = 0;
    unsafe {
        assert_eq!(shim_timespec_get(ptr::null_mut(), TIME_UTC), 0);
        assert_eq!(shim_clock_now(TIME_UTC, ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_clock_now(0, &mut out), THRD_ERROR);
        assert_eq!(shim_timespec_add(ptr::null(), &ts, &mut out), THRD_ERROR);
        assert_eq!(shim_timespec_add(&ts, &ts, ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_timespec_sub(&ts, ptr::null(), &mut out), THRD_ERROR);
        assert_eq!(shim_timespec_cmp(&ts, &ts, ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_timespec_cmp(&ts, &ts, &mut ord), 0);
        assert_eq!(shim_deadline_after_ms(10, ptr::null_mut()), THRD_ERROR);
    }
    assert_eq!(ord, 0);
}

#[test]
fn rejected_calls_are_counted() {
    let before = result_counters();
    unsafe {
        assert_eq!(shim_mtx_lock(ptr::null_mut()), THRD_ERROR);
        assert_eq!(shim_cnd_signal(ptr::null_mut()), THRD_ERROR);
    }
    let delta = result_counters().since(&before);
    assert!(delta.calls >= 2);
    assert!(delta.error >= 2);
}
