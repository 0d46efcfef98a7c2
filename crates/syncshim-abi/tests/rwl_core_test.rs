use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use syncshim_abi::rwl_abi::{
    shim_rwl_destroy, shim_rwl_init, shim_rwl_rdlock, shim_rwl_timedwrlock, shim_rwl_tryrdlock,
    shim_rwl_trywrlock, shim_rwl_unlock, shim_rwl_wrlock,
};
use syncshim_abi::time_abi::shim_deadline_after_ms;
use syncshim_abi::{THRD_BUSY, THRD_SUCCESS, THRD_TIMEDOUT, rwl_t, shim_timespec};

fn alloc_rwlock() -> *mut rwl_t {
    let rwl = Box::into_raw(Box::new(rwl_t::new()));
    assert_eq!(unsafe { shim_rwl_init(rwl) }, THRD_SUCCESS);
    rwl
}

unsafe fn free_rwlock(rwl: *mut rwl_t) {
    assert_eq!(unsafe { shim_rwl_destroy(rwl) }, THRD_SUCCESS);
    // SAFETY: allocated with Box::into_raw in alloc_rwlock.
    unsafe { drop(Box::from_raw(rwl)) };
}

#[test]
fn concurrent_readers_block_trywrlock() {
    const READERS: usize = 4;
    let rwl = alloc_rwlock();
    let addr = rwl as usize;
    let all_reading = Arc::new(Barrier::new(READERS + 1));
    let release = Arc::new(Barrier::new(READERS + 1));

    let readers: Vec<_> = (0..READERS)
        .map(|_| {
            let (all_reading, release) = (Arc::clone(&all_reading), Arc::clone(&release));
            std::thread::spawn(move || unsafe {
                assert_eq!(shim_rwl_rdlock(addr as *mut rwl_t), THRD_SUCCESS);
                // Every reader reaches here while the others still hold.
                all_reading.wait();
                release.wait();
                assert_eq!(shim_rwl_unlock(addr as *mut rwl_t), THRD_SUCCESS);
            })
        })
        .collect();

    all_reading.wait();
    unsafe {
        assert_eq!(shim_rwl_trywrlock(rwl), THRD_BUSY);
        let mut deadline = shim_timespec::default();
        assert_eq!(shim_deadline_after_ms(20, &mut deadline), THRD_SUCCESS);
        assert_eq!(shim_rwl_timedwrlock(rwl, &deadline), THRD_TIMEDOUT);
        assert_eq!(shim_rwl_destroy(rwl), THRD_BUSY);
    }
    release.wait();
    for reader in readers {
        reader.join().unwrap();
    }

    unsafe {
        assert_eq!(shim_rwl_trywrlock(rwl), THRD_SUCCESS);
        assert_eq!(shim_rwl_unlock(rwl), THRD_SUCCESS);
        free_rwlock(rwl);
    }
}

#[test]
fn writer_excludes_readers() {
    let rwl = alloc_rwlock();
    let addr = rwl as usize;
    let writing = Arc::new(AtomicBool::new(false));
    unsafe {
        assert_eq!(shim_rwl_wrlock(rwl), THRD_SUCCESS);
    }
    writing.store(true, Ordering::Release);

    let reader = {
        let writing = Arc::clone(&writing);
        std::thread::spawn(move || unsafe {
            assert_eq!(shim_rwl_tryrdlock(addr as *mut rwl_t), THRD_BUSY);
            assert_eq!(shim_rwl_rdlock(addr as *mut rwl_t), THRD_SUCCESS);
            assert!(!writing.load(Ordering::Acquire));
            assert_eq!(shim_rwl_unlock(addr as *mut rwl_t), THRD_SUCCESS);
        })
    };

    std::thread::sleep(std::time::Duration::from_millis(20));
    writing.store(false, Ordering::Release);
    unsafe {
        assert_eq!(shim_rwl_unlock(rwl), THRD_SUCCESS);
    }
    reader.join().unwrap();
    unsafe { free_rwlock(rwl) };
}
